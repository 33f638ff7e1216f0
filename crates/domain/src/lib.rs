//! Domain layer for the marketplace order engine.
//!
//! This crate provides the entities the reservation engine and the order
//! orchestrator operate on:
//! - the inventory ledger (record, reservation, movement) with its
//!   conservation and non-negativity guards
//! - the Order aggregate with its table-driven status state machine and
//!   post-creation immutability rules
//! - the domain events published on the outbox after a commit
//!
//! All quantity arithmetic lives here; transaction scoping and
//! persistence live in the `store` crate.

pub mod events;
pub mod inventory;
pub mod order;

pub use events::DomainEvent;
pub use inventory::{
    InventoryError, InventoryMovement, InventoryRecord, InventoryReservation, MovementKind,
    ReservationStatus,
};
pub use order::{
    Address, Order, OrderError, OrderItem, OrderItemStatus, OrderParts, OrderStatus,
    PricingTotals, ProductSnapshot,
};
