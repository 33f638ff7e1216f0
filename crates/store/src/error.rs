use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint rejected the write (reservation key, order
    /// number, or (variant, seller) pair).
    #[error("duplicate key for {entity}: {key}")]
    DuplicateKey { entity: &'static str, key: String },

    /// Two serializable transactions conflicted; the loser may retry and
    /// will observe the winner's writes.
    #[error("serializable transaction conflict")]
    SerializationConflict,

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
