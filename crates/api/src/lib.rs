//! HTTP API server for the marketplace order engine.
//!
//! Exposes order creation, the reservation engine's four operations, and
//! the housekeeping sweeps, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{MemoryStore, Outbox, OutboxDispatcher, UnitOfWork};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<U: UnitOfWork>(
    state: Arc<AppState<U>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<U>))
        .route("/orders/{id}", get(routes::orders::get::<U>))
        .route("/orders/expire", post(routes::orders::expire::<U>))
        .route(
            "/inventory/records",
            post(routes::inventory::create_record::<U>),
        )
        .route(
            "/inventory/records/{variant_id}/{seller_id}",
            get(routes::inventory::get_record::<U>),
        )
        .route(
            "/inventory/reservations",
            post(routes::inventory::reserve::<U>),
        )
        .route(
            "/inventory/reservations/{key}/release",
            post(routes::inventory::release::<U>),
        )
        .route(
            "/inventory/reservations/{key}/commit",
            post(routes::inventory::commit::<U>),
        )
        .route("/inventory/cleanup", post(routes::inventory::cleanup::<U>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over the in-memory store with
/// the in-memory collaborator fakes.
pub fn create_default_state() -> (Arc<AppState<MemoryStore>>, OutboxDispatcher) {
    use inventory::ReservationEngine;
    use orchestrator::{
        InMemoryAuditService, InMemoryPricingService, InMemoryValidationService, OrderOrchestrator,
    };

    let store = MemoryStore::new();
    let (outbox, dispatcher) = Outbox::bounded(256);
    let pricing = InMemoryPricingService::new();
    let validation = InMemoryValidationService::new();
    let audit = InMemoryAuditService::new();

    let orchestrator = OrderOrchestrator::new(
        store.clone(),
        outbox.clone(),
        pricing.clone(),
        validation,
        audit,
    );
    let engine = ReservationEngine::new(store.clone(), outbox);

    let state = Arc::new(AppState {
        orchestrator,
        engine,
        pricing,
        store,
    });
    (state, dispatcher)
}
