use chrono::{DateTime, Utc};
use common::{CustomerId, Currency, Money, OrderId, OrderNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderError, OrderItem, OrderStatus};

/// The pricing snapshot locked into an order at creation.
///
/// Immutable for the life of the order; later promotion or price changes
/// never touch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
    pub currency: Currency,
}

impl PricingTotals {
    /// Checks `total == subtotal + tax + shipping - discount` within the
    /// currency's rounding tolerance (one minor unit).
    pub fn verify(&self) -> Result<(), OrderError> {
        let expected = self.subtotal + self.tax + self.shipping - self.discount;
        if expected.abs_diff(self.total) > self.currency.tolerance() {
            return Err(OrderError::TotalMismatch {
                subtotal: self.subtotal,
                tax: self.tax,
                shipping: self.shipping,
                discount: self.discount,
                total: self.total,
            });
        }
        Ok(())
    }
}

/// A postal address snapshot embedded in the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Everything needed to rebuild an [`Order`] from storage.
///
/// Rehydration bypasses the creation-time invariant checks; the stored
/// state already passed them once.
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub totals: PricingTotals,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub items: Vec<OrderItem>,
    pub expires_at: DateTime<Utc>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub tracking_number: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// The order aggregate root.
///
/// Created once, inside the persistence transaction, already complete:
/// items, pricing, and addresses are fixed at that point. After the
/// status leaves `Pending` only the narrow allow-list (tracking number,
/// delivery date, notes) plus status and refund bookkeeping may change;
/// everything else fails `Immutable` as a standing invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: OrderNumber,
    customer_id: CustomerId,
    status: OrderStatus,
    totals: PricingTotals,
    shipping_address: Address,
    billing_address: Address,
    items: Vec<OrderItem>,
    expires_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every mutation.
    version: u64,
    created_at: DateTime<Utc>,
    tracking_number: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    notes: Option<String>,
}

impl Order {
    /// Creates a new `Pending` order, verifying the monetary invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: OrderId,
        order_number: OrderNumber,
        customer_id: CustomerId,
        totals: PricingTotals,
        shipping_address: Address,
        billing_address: Address,
        items: Vec<OrderItem>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        totals.verify()?;
        let tolerance = totals.currency.tolerance();
        for item in &items {
            let expected = item.unit_price.multiply(item.quantity);
            if expected.abs_diff(item.total_price) > tolerance {
                return Err(OrderError::ItemTotalMismatch {
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                    total: item.total_price,
                });
            }
        }
        Ok(Self {
            id,
            order_number,
            customer_id,
            status: OrderStatus::Pending,
            totals,
            shipping_address,
            billing_address,
            items,
            expires_at,
            version: 0,
            created_at: Utc::now(),
            tracking_number: None,
            delivered_at: None,
            notes: None,
        })
    }

    /// Rebuilds an order from its stored parts.
    pub fn rehydrate(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            order_number: parts.order_number,
            customer_id: parts.customer_id,
            status: parts.status,
            totals: parts.totals,
            shipping_address: parts.shipping_address,
            billing_address: parts.billing_address,
            items: parts.items,
            expires_at: parts.expires_at,
            version: parts.version,
            created_at: parts.created_at,
            tracking_number: parts.tracking_number,
            delivered_at: parts.delivered_at,
            notes: parts.notes,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn totals(&self) -> &PricingTotals {
        &self.totals
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns true if the order is still unpaid past its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && self.expires_at <= now
    }
}

// Mutation methods
impl Order {
    /// Moves the order to `next`, checking the transition table first.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.version += 1;
        Ok(())
    }

    /// Confirms the order (payment received).
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Confirmed)
    }

    /// Cancels the order.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Cancelled)
    }

    /// Marks the order failed (retryable back to Pending).
    pub fn mark_failed(&mut self) -> Result<(), OrderError> {
        self.transition_to(OrderStatus::Failed)
    }

    /// Replaces the shipping address. Only legal while Pending.
    pub fn update_shipping_address(&mut self, address: Address) -> Result<(), OrderError> {
        if self.status.is_frozen() {
            return Err(OrderError::Immutable {
                field: "shipping_address",
                status: self.status,
            });
        }
        self.shipping_address = address;
        self.version += 1;
        Ok(())
    }

    /// Replaces the billing address. Only legal while Pending.
    pub fn update_billing_address(&mut self, address: Address) -> Result<(), OrderError> {
        if self.status.is_frozen() {
            return Err(OrderError::Immutable {
                field: "billing_address",
                status: self.status,
            });
        }
        self.billing_address = address;
        self.version += 1;
        Ok(())
    }

    /// Sets the carrier tracking number (post-creation allow-list).
    pub fn set_tracking_number(&mut self, tracking_number: impl Into<String>) {
        self.tracking_number = Some(tracking_number.into());
        self.version += 1;
    }

    /// Sets the delivery timestamp (post-creation allow-list).
    pub fn set_delivered_at(&mut self, delivered_at: DateTime<Utc>) {
        self.delivered_at = Some(delivered_at);
        self.version += 1;
    }

    /// Sets free-form notes (post-creation allow-list).
    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = Some(notes.into());
        self.version += 1;
    }

    /// Records a refund against one item, bounded by the item's original
    /// quantity and total.
    pub fn record_item_refund(
        &mut self,
        item_id: Uuid,
        quantity: i64,
        amount: Money,
    ) -> Result<(), OrderError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(OrderError::ItemNotFound(item_id))?;
        item.record_refund(quantity, amount)?;
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderItemStatus, ProductSnapshot};
    use chrono::Duration;
    use common::{ReservationKey, SellerId, VariantId};
    use std::collections::BTreeMap;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            product_name: "Trail Shoe".to_string(),
            variant_name: "Trail Shoe 42 / blue".to_string(),
            brand_name: None,
            category_name: None,
            seller_name: "Peak Outfitters".to_string(),
            attributes: BTreeMap::new(),
        }
    }

    fn address() -> Address {
        Address {
            name: "Ada Lovelace".to_string(),
            line1: "1 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            postal_code: "EC1A 1AA".to_string(),
            country: "GB".to_string(),
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

    fn totals(subtotal: i64, tax: i64, shipping: i64, discount: i64, total: i64) -> PricingTotals {
        PricingTotals {
            subtotal: Money::from_minor(subtotal),
            tax: Money::from_minor(tax),
            shipping: Money::from_minor(shipping),
            discount: Money::from_minor(discount),
            total: Money::from_minor(total),
            currency: Currency::Usd,
        }
    }

    fn order() -> Order {
        Order::create(
            OrderId::new(),
            OrderNumber::generate(),
            CustomerId::new(),
            totals(2000, 175, 500, 100, 2575),
            address(),
            address(),
            vec![item(2, 1000)],
            Utc::now() + Duration::minutes(30),
        )
        .unwrap()
    }

    #[test]
    fn create_verifies_the_total() {
        let result = Order::create(
            OrderId::new(),
            OrderNumber::generate(),
            CustomerId::new(),
            totals(2000, 175, 500, 100, 9999),
            address(),
            address(),
            vec![item(2, 1000)],
            Utc::now(),
        );
        assert!(matches!(result, Err(OrderError::TotalMismatch { .. })));
    }

    #[test]
    fn create_tolerates_one_minor_unit_of_rounding() {
        let order = Order::create(
            OrderId::new(),
            OrderNumber::generate(),
            CustomerId::new(),
            totals(2000, 175, 500, 100, 2576),
            address(),
            address(),
            vec![item(2, 1000)],
            Utc::now(),
        );
        assert!(order.is_ok());
    }

    #[test]
    fn create_rejects_empty_orders() {
        let result = Order::create(
            OrderId::new(),
            OrderNumber::generate(),
            CustomerId::new(),
            totals(0, 0, 0, 0, 0),
            address(),
            address(),
            vec![],
            Utc::now(),
        );
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn create_checks_item_totals() {
        let mut bad_item = item(2, 1000);
        bad_item.total_price = Money::from_minor(1500);
        let result = Order::create(
            OrderId::new(),
            OrderNumber::generate(),
            CustomerId::new(),
            totals(2000, 175, 500, 100, 2575),
            address(),
            address(),
            vec![bad_item],
            Utc::now(),
        );
        assert!(matches!(result, Err(OrderError::ItemTotalMismatch { .. })));
    }

    #[test]
    fn new_order_is_pending() {
        let order = order();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.version(), 0);
    }

    #[test]
    fn legal_transition_bumps_version() {
        let mut order = order();
        order.confirm().unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.version(), 1);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut order = order();
        let err = order.transition_to(OrderStatus::Shipped).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            }
        ));
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn full_lifecycle() {
        let mut order = order();
        order.confirm().unwrap();
        order.transition_to(OrderStatus::Processing).unwrap();
        order.transition_to(OrderStatus::Shipped).unwrap();
        order.transition_to(OrderStatus::Delivered).unwrap();
        order.transition_to(OrderStatus::Refunded).unwrap();
        assert!(order.status().is_terminal());
    }

    #[test]
    fn failed_order_can_retry_to_pending() {
        let mut order = order();
        order.mark_failed().unwrap();
        order.transition_to(OrderStatus::Pending).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn addresses_are_editable_while_pending() {
        let mut order = order();
        let mut new_address = address();
        new_address.city = "Manchester".to_string();
        order.update_shipping_address(new_address.clone()).unwrap();
        assert_eq!(order.shipping_address().city, "Manchester");
    }

    #[test]
    fn addresses_freeze_once_confirmed() {
        let mut order = order();
        order.confirm().unwrap();
        let err = order.update_shipping_address(address()).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Immutable {
                field: "shipping_address",
                status: OrderStatus::Confirmed
            }
        ));
        let err = order.update_billing_address(address()).unwrap_err();
        assert!(matches!(err, OrderError::Immutable { .. }));
    }

    #[test]
    fn allow_list_fields_stay_mutable_after_confirmation() {
        let mut order = order();
        order.confirm().unwrap();
        order.set_tracking_number("TRACK-123");
        order.set_notes("leave at the door");
        order.set_delivered_at(Utc::now());
        assert_eq!(order.tracking_number(), Some("TRACK-123"));
        assert_eq!(order.notes(), Some("leave at the door"));
        assert!(order.delivered_at().is_some());
    }

    #[test]
    fn item_refund_through_the_aggregate() {
        let mut order = order();
        let item_id = order.items()[0].id;
        order
            .record_item_refund(item_id, 2, Money::from_minor(2000))
            .unwrap();
        assert_eq!(order.items()[0].status, OrderItemStatus::Refunded);

        let err = order
            .record_item_refund(item_id, 1, Money::from_minor(1))
            .unwrap_err();
        assert!(matches!(err, OrderError::RefundExceedsItem { .. }));
    }

    #[test]
    fn refund_on_unknown_item_fails() {
        let mut order = order();
        let err = order
            .record_item_refund(Uuid::new_v4(), 1, Money::from_minor(1))
            .unwrap_err();
        assert!(matches!(err, OrderError::ItemNotFound(_)));
    }

    #[test]
    fn expiry_only_applies_to_pending_orders() {
        let mut order = order();
        let later = order.expires_at() + Duration::seconds(1);
        assert!(order.is_expired(later));
        order.confirm().unwrap();
        assert!(!order.is_expired(later));
    }

    #[test]
    fn rehydrate_preserves_state() {
        let mut original = order();
        original.confirm().unwrap();
        let parts = OrderParts {
            id: original.id(),
            order_number: original.order_number().clone(),
            customer_id: original.customer_id(),
            status: original.status(),
            totals: *original.totals(),
            shipping_address: original.shipping_address().clone(),
            billing_address: original.billing_address().clone(),
            items: original.items().to_vec(),
            expires_at: original.expires_at(),
            version: original.version(),
            created_at: original.created_at(),
            tracking_number: None,
            delivered_at: None,
            notes: None,
        };
        let rebuilt = Order::rehydrate(parts);
        assert_eq!(rebuilt, original);
    }
}
