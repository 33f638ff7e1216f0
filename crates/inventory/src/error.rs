use common::{ReservationKey, SellerId, VariantId};
use domain::inventory::{InventoryError, ReservationStatus};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during reservation engine operations.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// No ledger record exists for the (variant, seller) pair.
    #[error("inventory record not found for variant {variant_id}, seller {seller_id}")]
    RecordNotFound {
        variant_id: VariantId,
        seller_id: SellerId,
    },

    /// No reservation exists under this key.
    #[error("reservation not found: {0}")]
    NotFound(ReservationKey),

    /// `reserve` was replayed with a key that already resolved; retrying
    /// cannot succeed without a different key.
    #[error("reservation {key} was already resolved as {status}")]
    AlreadyResolved {
        key: ReservationKey,
        status: ReservationStatus,
    },

    /// Ledger arithmetic or reservation transition guard
    /// (insufficient stock, double release).
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ReservationError>;
