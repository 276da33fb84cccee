//! Storage-specific error type wrapping sqlx errors.

use martha_domain::error::MarthaError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored setting could not be parsed back.
    #[error("invalid value {value:?} for setting {key}")]
    InvalidSetting { key: String, value: String },
}

impl From<StorageError> for MarthaError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
