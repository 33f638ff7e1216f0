//! The order aggregate and its status state machine.

mod aggregate;
mod item;
mod status;

pub use aggregate::{Address, Order, OrderParts, PricingTotals};
pub use item::{OrderItem, OrderItemStatus, ProductSnapshot};
pub use status::OrderStatus;

use common::Money;
use thiserror::Error;

/// Errors raised by the order aggregate.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested status change is not a legal edge of the state
    /// machine.
    #[error("invalid order status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The field is frozen because the order has left Pending.
    #[error("order field '{field}' is immutable in status {status}")]
    Immutable {
        field: &'static str,
        status: OrderStatus,
    },

    /// An order must contain at least one item.
    #[error("order has no items")]
    NoItems,

    /// Quantities must be strictly positive.
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),

    /// An item's total does not match its unit price times quantity.
    #[error("item total {total} does not match unit price {unit_price} x {quantity}")]
    ItemTotalMismatch {
        unit_price: Money,
        quantity: i64,
        total: Money,
    },

    /// The order total does not reconcile with its components.
    #[error(
        "order total {total} does not match subtotal {subtotal} + tax {tax} + shipping {shipping} - discount {discount}"
    )]
    TotalMismatch {
        subtotal: Money,
        tax: Money,
        shipping: Money,
        discount: Money,
        total: Money,
    },

    /// A refund would exceed the item's remaining quantity or amount.
    #[error("refund of {quantity} x {amount} exceeds what remains on the item")]
    RefundExceedsItem { quantity: i64, amount: Money },

    /// No item with the given id exists on this order.
    #[error("order item not found: {0}")]
    ItemNotFound(uuid::Uuid),
}
