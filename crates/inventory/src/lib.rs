//! Reservation engine over the inventory ledger.
//!
//! The engine is the only writer of ledger quantities. Each operation is
//! one serializable unit of work: concurrent attempts against the same
//! inventory record serialize at the storage layer, so one wins and the
//! other observes the updated availability. Idempotency comes from the
//! reservation key — replaying `reserve` with a key that already holds
//! stock returns the existing reservation without touching the ledger.
//!
//! Every mutation appends a movement row and, after the transaction
//! commits, publishes a domain event — never before.

pub mod engine;
pub mod error;

pub use engine::{CleanupReport, ReservationEngine, ReserveRequest};
pub use error::ReservationError;
