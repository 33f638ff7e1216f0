use chrono::{DateTime, Utc};
use common::{InventoryRecordId, ReservationId, ReservationKey};
use serde::{Deserialize, Serialize};

use super::InventoryError;

/// Lifecycle of a stock hold.
///
/// `Active` is the only non-terminal state; a reservation resolves
/// exactly once, either by release (stock returns to available) or by
/// commit (stock is consumed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Released,
    Committed,
}

impl ReservationStatus {
    /// Returns true if the reservation still holds stock.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "Active",
            ReservationStatus::Released => "Released",
            ReservationStatus::Committed => "Committed",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(ReservationStatus::Active),
            "Released" => Ok(ReservationStatus::Released),
            "Committed" => Ok(ReservationStatus::Committed),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

/// A time-boxed hold of stock against one inventory record, keyed by a
/// client- or orchestrator-supplied idempotency token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReservation {
    pub id: ReservationId,
    pub record_id: InventoryRecordId,
    pub quantity: i64,
    pub reservation_key: ReservationKey,
    pub reference_type: String,
    pub reference_id: String,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl InventoryReservation {
    /// Creates a new active reservation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        record_id: InventoryRecordId,
        quantity: i64,
        reservation_key: ReservationKey,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
        expires_at: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Result<Self, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::QuantityNotPositive(quantity));
        }
        Ok(Self {
            id: ReservationId::new(),
            record_id,
            quantity,
            reservation_key,
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
            status: ReservationStatus::Active,
            expires_at,
            created_by: created_by.into(),
            created_at: Utc::now(),
        })
    }

    /// Resolves the reservation as released. Fails `InvalidState` unless
    /// active, so a double release cannot double-credit stock.
    pub fn release(&mut self) -> Result<(), InventoryError> {
        self.transition(ReservationStatus::Released)
    }

    /// Resolves the reservation as committed.
    pub fn commit(&mut self) -> Result<(), InventoryError> {
        self.transition(ReservationStatus::Committed)
    }

    fn transition(&mut self, next: ReservationStatus) -> Result<(), InventoryError> {
        if !self.status.is_active() {
            return Err(InventoryError::InvalidState {
                expected: ReservationStatus::Active,
                actual: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns true once the hold has passed its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
