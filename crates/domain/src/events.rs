//! Domain events published on the outbox.
//!
//! Events announce state that has already committed; publishers must
//! never emit one before the surrounding transaction commits, so a
//! rollback can never be announced.

use chrono::{DateTime, Utc};
use common::{Currency, CustomerId, Money, OrderId, OrderNumber, ReservationKey, SellerId, VariantId};
use serde::{Deserialize, Serialize};

use crate::inventory::InventoryReservation;
use crate::order::Order;

/// Events carried by the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    /// An order was persisted successfully.
    OrderCreated(OrderCreatedData),

    /// Order creation failed after compensation ran.
    OrderFailed(OrderFailedData),

    /// Stock was reserved.
    InventoryReserved(InventoryReservedData),

    /// A reservation was released back to available stock.
    InventoryReleased(InventoryReleasedData),

    /// A reservation was committed; the stock is consumed.
    InventoryCommitted(InventoryCommittedData),
}

impl DomainEvent {
    /// The topic the event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "order.created",
            DomainEvent::OrderFailed(_) => "order.failed",
            DomainEvent::InventoryReserved(_) => "inventory.reserved",
            DomainEvent::InventoryReleased(_) => "inventory.released",
            DomainEvent::InventoryCommitted(_) => "inventory.committed",
        }
    }

    /// Builds an `order.created` event from a persisted order.
    pub fn order_created(order: &Order) -> Self {
        DomainEvent::OrderCreated(OrderCreatedData {
            order_id: order.id(),
            order_number: order.order_number().clone(),
            customer_id: order.customer_id(),
            total: order.totals().total,
            currency: order.totals().currency,
            item_count: order.items().len(),
            occurred_at: Utc::now(),
        })
    }

    /// Builds an `order.failed` event with the failure reason.
    pub fn order_failed(customer_id: CustomerId, reason: impl Into<String>) -> Self {
        DomainEvent::OrderFailed(OrderFailedData {
            customer_id,
            reason: reason.into(),
            occurred_at: Utc::now(),
        })
    }

    /// Builds an `inventory.reserved` event from a fresh reservation.
    pub fn inventory_reserved(
        reservation: &InventoryReservation,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Self {
        DomainEvent::InventoryReserved(InventoryReservedData {
            reservation_key: reservation.reservation_key.clone(),
            variant_id,
            seller_id,
            quantity: reservation.quantity,
            expires_at: reservation.expires_at,
            occurred_at: Utc::now(),
        })
    }

    /// Builds an `inventory.released` event.
    pub fn inventory_released(
        reservation: &InventoryReservation,
        variant_id: VariantId,
        seller_id: SellerId,
        reason: impl Into<String>,
    ) -> Self {
        DomainEvent::InventoryReleased(InventoryReleasedData {
            reservation_key: reservation.reservation_key.clone(),
            variant_id,
            seller_id,
            quantity: reservation.quantity,
            reason: reason.into(),
            occurred_at: Utc::now(),
        })
    }

    /// Builds an `inventory.committed` event.
    pub fn inventory_committed(
        reservation: &InventoryReservation,
        variant_id: VariantId,
        seller_id: SellerId,
    ) -> Self {
        DomainEvent::InventoryCommitted(InventoryCommittedData {
            reservation_key: reservation.reservation_key.clone(),
            variant_id,
            seller_id,
            quantity: reservation.quantity,
            reference: reservation.reference_id.clone(),
            occurred_at: Utc::now(),
        })
    }
}

/// Data for `order.created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    pub total: Money,
    pub currency: Currency,
    pub item_count: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Data for `order.failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFailedData {
    pub customer_id: CustomerId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Data for `inventory.reserved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReservedData {
    pub reservation_key: ReservationKey,
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Data for `inventory.released`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReleasedData {
    pub reservation_key: ReservationKey,
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Data for `inventory.committed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCommittedData {
    pub reservation_key: ReservationKey,
    pub variant_id: VariantId,
    pub seller_id: SellerId,
    pub quantity: i64,
    pub reference: String,
    pub occurred_at: DateTime<Utc>,
}
