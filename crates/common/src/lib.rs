//! Shared types for the marketplace order engine.
//!
//! Typed identifiers for the entities that cross crate boundaries, plus
//! money arithmetic in currency minor units.

pub mod money;
pub mod types;

pub use money::{Currency, Money};
pub use types::{
    CustomerId, InventoryRecordId, OrderId, OrderNumber, ReservationId, ReservationKey, SellerId,
    VariantId,
};
