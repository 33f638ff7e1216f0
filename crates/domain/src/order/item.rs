use std::collections::BTreeMap;

use common::{Money, ReservationKey, SellerId, VariantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OrderError;

/// Catalog data frozen into the order at creation time.
///
/// Once an item is written, its snapshot is never re-read from the live
/// catalog; later renames or re-categorizations do not touch past orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_name: String,
    pub variant_name: String,
    pub brand_name: Option<String>,
    pub category_name: Option<String>,
    pub seller_name: String,
    pub attributes: BTreeMap<String, String>,
}

/// Status of a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrderItemStatus {
    #[default]
    Active,
    Cancelled,
    Refunded,
}

impl OrderItemStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Active => "Active",
            OrderItemStatus::Cancelled => "Cancelled",
            OrderItemStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(OrderItemStatus::Active),
            "Cancelled" => Ok(OrderItemStatus::Cancelled),
            "Refunded" => Ok(OrderItemStatus::Refunded),
            other => Err(format!("unknown order item status: {other}")),
        }
    }
}

/// One line of an order.
///
/// Immutable after creation except for `status` and the refund
/// bookkeeping, both bounded by the original quantity and price. The
/// total is computed at construction so `total_price == unit_price *
/// quantity` holds by definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
    /// The idempotency token of the stock hold backing this line.
    pub reservation_key: ReservationKey,
    pub status: OrderItemStatus,
    pub snapshot: ProductSnapshot,
    pub refunded_quantity: i64,
    pub refunded_amount: Money,
}

impl OrderItem {
    /// Creates a new item, computing the line total.
    pub fn new(
        variant_id: VariantId,
        seller_id: SellerId,
        quantity: i64,
        unit_price: Money,
        reservation_key: ReservationKey,
        snapshot: ProductSnapshot,
    ) -> Result<Self, OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            variant_id,
            seller_id,
            quantity,
            unit_price,
            total_price: unit_price.multiply(quantity),
            reservation_key,
            status: OrderItemStatus::Active,
            snapshot,
            refunded_quantity: 0,
            refunded_amount: Money::zero(),
        })
    }

    /// Records a partial or full refund against this item.
    ///
    /// Both counters are bounded by the original quantity and total; a
    /// full-quantity refund also flips the status to `Refunded`.
    pub fn record_refund(&mut self, quantity: i64, amount: Money) -> Result<(), OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        let over_quantity = self.refunded_quantity + quantity > self.quantity;
        let over_amount = self.refunded_amount + amount > self.total_price;
        if over_quantity || over_amount || amount.is_negative() {
            return Err(OrderError::RefundExceedsItem { quantity, amount });
        }
        self.refunded_quantity += quantity;
        self.refunded_amount += amount;
        if self.refunded_quantity == self.quantity {
            self.status = OrderItemStatus::Refunded;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            product_name: "Trail Shoe".to_string(),
            variant_name: "Trail Shoe 42 / blue".to_string(),
            brand_name: Some("Northpeak".to_string()),
            category_name: Some("Footwear".to_string()),
            seller_name: "Peak Outfitters".to_string(),
            attributes: BTreeMap::from([
                ("size".to_string(), "42".to_string()),
                ("color".to_string(), "blue".to_string()),
            ]),
        }
    }

    fn item(quantity: i64, unit_price: i64) -> OrderItem {
        OrderItem::new(
            VariantId::new(),
            SellerId::new(),
            quantity,
            Money::from_minor(unit_price),
            ReservationKey::generate(),
            snapshot(),
        )
        .unwrap()
    }

    #[test]
    fn total_is_unit_price_times_quantity() {
        let item = item(3, 1250);
        assert_eq!(item.total_price, Money::from_minor(3750));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let result = OrderItem::new(
            VariantId::new(),
            SellerId::new(),
            0,
            Money::from_minor(100),
            ReservationKey::generate(),
            snapshot(),
        );
        assert!(matches!(result, Err(OrderError::InvalidQuantity(0))));
    }

    #[test]
    fn partial_refund_accumulates() {
        let mut item = item(4, 1000);
        item.record_refund(1, Money::from_minor(1000)).unwrap();
        item.record_refund(2, Money::from_minor(2000)).unwrap();
        assert_eq!(item.refunded_quantity, 3);
        assert_eq!(item.refunded_amount, Money::from_minor(3000));
        assert_eq!(item.status, OrderItemStatus::Active);
    }

    #[test]
    fn full_refund_flips_status() {
        let mut item = item(2, 500);
        item.record_refund(2, Money::from_minor(1000)).unwrap();
        assert_eq!(item.status, OrderItemStatus::Refunded);
    }

    #[test]
    fn refund_is_bounded_by_original_quantity() {
        let mut item = item(2, 500);
        let err = item.record_refund(3, Money::from_minor(100)).unwrap_err();
        assert!(matches!(err, OrderError::RefundExceedsItem { .. }));
        assert_eq!(item.refunded_quantity, 0);
    }

    #[test]
    fn refund_is_bounded_by_original_amount() {
        let mut item = item(2, 500);
        assert!(item.record_refund(1, Money::from_minor(1001)).is_err());
    }
}
