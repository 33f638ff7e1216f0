//! Orchestrator error taxonomy.

use domain::inventory::InventoryError;
use domain::order::OrderError;
use inventory::ReservationError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by order creation.
///
/// Business failures are `Err` values, never panics; [`ErrorKind`]
/// classifies each one so callers can tell "retrying won't help without
/// different input" apart from transient infrastructure trouble.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Bad input, unknown customer/variant, or a business-rule breach.
    /// Rejected before any side effect exists.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The pricing collaborator failed.
    #[error("pricing service error: {0}")]
    Pricing(String),

    /// Reserving stock failed.
    #[error("inventory reservation failed: {0}")]
    Reservation(#[from] ReservationError),

    /// The order aggregate rejected its invariants.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// The storage layer failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification for callers and the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input; fix the request.
    Validation,
    /// A conflicting fact (insufficient stock, duplicate key, lost
    /// serializable race); retrying verbatim will not help.
    Conflict,
    /// An illegal state transition or frozen-field mutation.
    State,
    /// Infrastructure fault; retry later.
    Infrastructure,
}

impl OrchestratorError {
    /// Classifies the error per the taxonomy above.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Validation(_) => ErrorKind::Validation,
            OrchestratorError::Pricing(_) => ErrorKind::Infrastructure,
            OrchestratorError::Reservation(err) => match err {
                ReservationError::RecordNotFound { .. } | ReservationError::NotFound(_) => {
                    ErrorKind::Validation
                }
                ReservationError::AlreadyResolved { .. } => ErrorKind::Conflict,
                ReservationError::Inventory(InventoryError::InsufficientStock { .. }) => {
                    ErrorKind::Conflict
                }
                ReservationError::Inventory(InventoryError::InvalidState { .. }) => ErrorKind::State,
                ReservationError::Inventory(_) => ErrorKind::Validation,
                ReservationError::Store(store_err) => store_kind(store_err),
            },
            OrchestratorError::Order(err) => match err {
                OrderError::InvalidTransition { .. } | OrderError::Immutable { .. } => {
                    ErrorKind::State
                }
                _ => ErrorKind::Validation,
            },
            OrchestratorError::Store(err) => store_kind(err),
        }
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::DuplicateKey { .. } | StoreError::SerializationConflict => ErrorKind::Conflict,
        _ => ErrorKind::Infrastructure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ReservationKey, SellerId, VariantId};
    use domain::inventory::ReservationStatus;
    use domain::order::OrderStatus;

    #[test]
    fn validation_errors_classify_as_validation() {
        let err = OrchestratorError::Validation("missing items".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn insufficient_stock_is_a_conflict() {
        let err = OrchestratorError::Reservation(ReservationError::Inventory(
            InventoryError::InsufficientStock {
                requested: 5,
                available: 2,
            },
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn already_resolved_is_a_conflict() {
        let err = OrchestratorError::Reservation(ReservationError::AlreadyResolved {
            key: ReservationKey::new("k"),
            status: ReservationStatus::Committed,
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn invalid_transition_is_a_state_error() {
        let err = OrchestratorError::Order(OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        });
        assert_eq!(err.kind(), ErrorKind::State);

        let err = OrchestratorError::Order(OrderError::Immutable {
            field: "shipping_address",
            status: OrderStatus::Confirmed,
        });
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn missing_record_reads_as_bad_input() {
        let err = OrchestratorError::Reservation(ReservationError::RecordNotFound {
            variant_id: VariantId::new(),
            seller_id: SellerId::new(),
        });
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn serialization_conflicts_and_duplicates_are_conflicts() {
        let err = OrchestratorError::Store(StoreError::SerializationConflict);
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = OrchestratorError::Store(StoreError::DuplicateKey {
            entity: "order",
            key: "ORD-1".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn pricing_failures_are_infrastructure() {
        let err = OrchestratorError::Pricing("pricing backend down".to_string());
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }
}
