//! Storage layer for the marketplace order engine.
//!
//! The central abstraction is the unit of work: [`UnitOfWork::serializable`]
//! opens a transaction at the storage engine's serializable isolation
//! level, hands the closure a transaction-scoped [`TxHandle`], and commits
//! or rolls back based on the closure's outcome. Stock correctness rests
//! entirely on that isolation level plus the reservation idempotency keys;
//! no in-process locks are involved.
//!
//! Two implementations ship: [`MemoryStore`] for tests (a mutex plus a
//! working copy — trivially serializable) and [`PostgresStore`] for
//! production.
//!
//! The [`outbox`] module carries domain events out of committed
//! transactions to a dispatcher, decoupling "did the event fire" from
//! "did a subscriber run".

pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod uow;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use outbox::{EventBus, Outbox, OutboxDispatcher};
pub use postgres::PostgresStore;
pub use uow::{TxHandle, UnitOfWork};
