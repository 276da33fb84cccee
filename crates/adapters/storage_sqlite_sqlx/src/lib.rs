//! # martha-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `martha-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `martha-app` (for port traits) and `martha-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod config_repo;
mod error;
mod pool;
mod relay_log;

pub use config_repo::SqliteConfigRepository;
pub use error::StorageError;
pub use pool::{Config, Database};
pub use relay_log::{DEFAULT_RETENTION, SqliteRelayLogStore};
