//! Shared application state.

use inventory::ReservationEngine;
use orchestrator::{
    InMemoryAuditService, InMemoryPricingService, InMemoryValidationService, OrderOrchestrator,
};
use store::{Outbox, UnitOfWork};

/// Shared application state accessible from all handlers.
///
/// The collaborators are the in-memory fakes; the real pricing,
/// validation, and audit systems live behind other deployments' wiring.
pub struct AppState<U: UnitOfWork> {
    pub orchestrator: OrderOrchestrator<
        U,
        Outbox,
        InMemoryPricingService,
        InMemoryValidationService,
        InMemoryAuditService,
    >,
    pub engine: ReservationEngine<U, Outbox>,
    pub pricing: InMemoryPricingService,
    pub store: U,
}
