//! Inventory ledger entities.
//!
//! The ledger is the authoritative available/reserved quantity pair per
//! (variant, seller), an append-only movement log, and the time-boxed
//! reservations held against it. Entities here carry the arithmetic and
//! the guards; they are only ever mutated inside a caller-held
//! serializable transaction.

mod movement;
mod record;
mod reservation;

pub use movement::{InventoryMovement, MovementKind};
pub use record::InventoryRecord;
pub use reservation::{InventoryReservation, ReservationStatus};

use thiserror::Error;

/// Errors raised by ledger arithmetic and reservation transitions.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Not enough available stock to cover the requested quantity.
    /// Raised before any write is applied.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// The reserved quantity would go negative. Always a ledger
    /// inconsistency, never expected in normal flow.
    #[error("reserved quantity underflow: requested {requested}, reserved {reserved}")]
    ReservedUnderflow { requested: i64, reserved: i64 },

    /// Quantities must be strictly positive.
    #[error("quantity must be positive, got {0}")]
    QuantityNotPositive(i64),

    /// The reservation is not in the state the operation requires.
    #[error("reservation is {actual}, expected {expected}")]
    InvalidState {
        expected: ReservationStatus,
        actual: ReservationStatus,
    },
}
