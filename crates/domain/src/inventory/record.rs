use common::{InventoryRecordId, SellerId, VariantId};
use serde::{Deserialize, Serialize};

use super::InventoryError;

/// The ledger row for one (variant, seller) pair.
///
/// `available + reserved` is conserved across `reserve` and `release`;
/// `commit` consumes stock permanently. Both counters stay non-negative:
/// the guard raises before any write is applied, so a failed operation
/// leaves the record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryRecordId,
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub available: i64,
    pub reserved: i64,
}

impl InventoryRecord {
    /// Creates a new record with the given on-hand stock and nothing reserved.
    pub fn new(variant_id: VariantId, seller_id: SellerId, available: i64) -> Self {
        Self {
            id: InventoryRecordId::new(),
            variant_id,
            seller_id,
            available,
            reserved: 0,
        }
    }

    /// Moves `quantity` from available to reserved.
    pub fn reserve(&mut self, quantity: i64) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::QuantityNotPositive(quantity));
        }
        if self.available < quantity {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available: self.available,
            });
        }
        self.available -= quantity;
        self.reserved += quantity;
        Ok(())
    }

    /// Returns `quantity` from reserved back to available.
    pub fn release(&mut self, quantity: i64) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::QuantityNotPositive(quantity));
        }
        if self.reserved < quantity {
            return Err(InventoryError::ReservedUnderflow {
                requested: quantity,
                reserved: self.reserved,
            });
        }
        self.reserved -= quantity;
        self.available += quantity;
        Ok(())
    }

    /// Consumes `quantity` from reserved. The stock leaves the ledger and
    /// does not return to available.
    pub fn commit(&mut self, quantity: i64) -> Result<(), InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::QuantityNotPositive(quantity));
        }
        if self.reserved < quantity {
            return Err(InventoryError::ReservedUnderflow {
                requested: quantity,
                reserved: self.reserved,
            });
        }
        self.reserved -= quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(available: i64) -> InventoryRecord {
        InventoryRecord::new(VariantId::new(), SellerId::new(), available)
    }

    #[test]
    fn reserve_moves_stock_to_reserved() {
        let mut r = record(10);
        r.reserve(4).unwrap();
        assert_eq!(r.available, 6);
        assert_eq!(r.reserved, 4);
    }

    #[test]
    fn reserve_rejects_oversell_without_mutation() {
        let mut r = record(6);
        let err = r.reserve(10).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                requested: 10,
                available: 6
            }
        ));
        assert_eq!(r.available, 6);
        assert_eq!(r.reserved, 0);
    }

    #[test]
    fn reserve_rejects_non_positive_quantity() {
        let mut r = record(5);
        assert!(matches!(
            r.reserve(0),
            Err(InventoryError::QuantityNotPositive(0))
        ));
        assert!(matches!(
            r.reserve(-3),
            Err(InventoryError::QuantityNotPositive(-3))
        ));
    }

    #[test]
    fn release_returns_stock_to_available() {
        let mut r = record(10);
        r.reserve(4).unwrap();
        r.release(4).unwrap();
        assert_eq!(r.available, 10);
        assert_eq!(r.reserved, 0);
    }

    #[test]
    fn release_guards_reserved_underflow() {
        let mut r = record(10);
        r.reserve(2).unwrap();
        let err = r.release(3).unwrap_err();
        assert!(matches!(err, InventoryError::ReservedUnderflow { .. }));
        assert_eq!(r.available, 8);
        assert_eq!(r.reserved, 2);
    }

    #[test]
    fn commit_consumes_stock_permanently() {
        let mut r = record(10);
        r.reserve(4).unwrap();
        r.commit(4).unwrap();
        assert_eq!(r.available, 6);
        assert_eq!(r.reserved, 0);
    }

    #[test]
    fn conservation_across_reserve_and_release() {
        let mut r = record(10);
        for _ in 0..3 {
            r.reserve(2).unwrap();
        }
        r.release(2).unwrap();
        assert_eq!(r.available + r.reserved, 10);
    }
}
