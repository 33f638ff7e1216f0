//! The request-local stack of reversible actions.
//!
//! Actions are a tagged enum rather than opaque closures so tests and
//! logs can see exactly what was rolled back and why.

use common::ReservationKey;

/// A reversible side effect registered while the saga advances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationAction {
    /// Release a stock hold made in phase 3.
    ReleaseReservation { key: ReservationKey },
    /// Release the price lock taken in phase 2.
    ReleasePriceLock { lock_id: String },
}

impl std::fmt::Display for CompensationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompensationAction::ReleaseReservation { key } => {
                write!(f, "release reservation {key}")
            }
            CompensationAction::ReleasePriceLock { lock_id } => {
                write!(f, "release price lock {lock_id}")
            }
        }
    }
}

/// LIFO stack of compensation actions for one order-creation attempt.
///
/// Request-local by construction; it is never shared across concurrent
/// sagas.
#[derive(Debug, Default)]
pub struct CompensationStack {
    actions: Vec<CompensationAction>,
}

impl CompensationStack {
    /// Registers an action to run if a later phase fails.
    pub fn push(&mut self, action: CompensationAction) {
        self.actions.push(action);
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Consumes the stack, yielding actions most-recent-first.
    pub fn unwind(self) -> impl Iterator<Item = CompensationAction> {
        self.actions.into_iter().rev()
    }
}
