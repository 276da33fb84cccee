//! Pool setup for the settings and relay log database.
//!
//! A file database runs in WAL mode so the relay log can be appended while the
//! dashboard reads it. `:memory:` gets a single connection kept alive for the
//! whole process, since every new connection would open an empty database.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StorageError;

/// Writers wait this long on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the controller keeps its state.
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:martha.db?mode=rwc` or `sqlite::memory:`).
    pub database_url: String,
}

impl Config {
    /// Open the database, creating the file if needed, and bring the schema
    /// up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is invalid, the file cannot be
    /// opened or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let in_memory = self.database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url = %self.database_url, in_memory, "database ready");

        Ok(Database { pool })
    }
}

/// Open database shared by the repositories.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight writes and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
