//! Order-creation saga coordinator.
//!
//! [`OrderOrchestrator::create_order`] drives the five-phase pipeline:
//! 1. validate (no side effects yet)
//! 2. price and lock the total
//! 3. reserve stock per item
//! 4. persist the order in one serializable transaction
//! 5. post-creation events and audit, best-effort
//!
//! Phases 2 and 3 register reversible actions on a request-local
//! [`CompensationStack`]; any failure before the order exists unwinds the
//! stack in reverse order. Phase 4 needs no entries of its own — the
//! transaction's atomicity is its compensation.
//!
//! Pricing, validation, and audit are collaborators consumed through the
//! narrow traits in [`services`]; their real implementations live
//! elsewhere, and the in-memory fakes here exist for tests and the demo
//! server.

pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod request;
pub mod services;

pub use compensation::{CompensationAction, CompensationStack};
pub use coordinator::{ExpiryReport, OrderOrchestrator};
pub use error::{ErrorKind, OrchestratorError};
pub use request::{CreateOrderRequest, RequestedItem};
pub use services::{
    AuditEntry, AuditService, InMemoryAuditService, InMemoryPricingService,
    InMemoryValidationService, PriceLock, PricedItem, PricingService, ValidationService,
};
