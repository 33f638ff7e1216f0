use chrono::{DateTime, Utc};
use common::InventoryRecordId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a movement did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    /// Stock moved from available to reserved.
    Reserved,
    /// Stock returned from reserved to available.
    Released,
    /// Stock left the ledger (a committed reservation).
    Out,
}

impl MovementKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Reserved => "Reserved",
            MovementKind::Released => "Released",
            MovementKind::Out => "Out",
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Reserved" => Ok(MovementKind::Reserved),
            "Released" => Ok(MovementKind::Released),
            "Out" => Ok(MovementKind::Out),
            other => Err(format!("unknown movement kind: {other}")),
        }
    }
}

/// One append-only ledger row recording a single quantity change.
///
/// Movements are never updated or deleted; together they are the audit
/// trail of every change to a record's quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub record_id: InventoryRecordId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    /// The reservation or order id this movement traces back to.
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryMovement {
    fn new(
        record_id: InventoryRecordId,
        kind: MovementKind,
        quantity: i64,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record_id,
            kind,
            quantity,
            reason: reason.into(),
            reference: reference.into(),
            occurred_at: Utc::now(),
        }
    }

    /// Records stock being reserved.
    pub fn reserved(
        record_id: InventoryRecordId,
        quantity: i64,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(record_id, MovementKind::Reserved, quantity, reference, reason)
    }

    /// Records reserved stock returning to available.
    pub fn released(
        record_id: InventoryRecordId,
        quantity: i64,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(record_id, MovementKind::Released, quantity, reference, reason)
    }

    /// Records stock leaving the ledger for good.
    pub fn out(
        record_id: InventoryRecordId,
        quantity: i64,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(record_id, MovementKind::Out, quantity, reference, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind() {
        let record_id = InventoryRecordId::new();
        let m = InventoryMovement::reserved(record_id, 4, "res-1", "stock reserved");
        assert_eq!(m.kind, MovementKind::Reserved);
        assert_eq!(m.quantity, 4);
        assert_eq!(m.record_id, record_id);

        let m = InventoryMovement::out(record_id, 4, "order-1", "order committed");
        assert_eq!(m.kind, MovementKind::Out);
        assert_eq!(m.reference, "order-1");
    }

    #[test]
    fn kind_roundtrips_through_strings() {
        for kind in [MovementKind::Reserved, MovementKind::Released, MovementKind::Out] {
            assert_eq!(kind.as_str().parse::<MovementKind>(), Ok(kind));
        }
    }
}
