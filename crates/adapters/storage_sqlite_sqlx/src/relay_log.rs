//! `SQLite` implementation of [`RelayLogStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use martha_app::ports::RelayLogStore;
use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;
use martha_domain::id::RelayEventId;
use martha_domain::relay::{RelayChannel, RelaySource};

use crate::error::StorageError;

struct Wrapper(RelayEvent);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let channel: String = row.try_get("channel")?;
        let state: bool = row.try_get("state")?;
        let source: String = row.try_get("source")?;
        let uptime_ms: i64 = row.try_get("uptime_ms")?;
        let recorded_at: String = row.try_get("recorded_at")?;

        let channel: RelayChannel = channel
            .parse()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let source: RelaySource = source
            .parse()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let uptime_ms =
            u64::try_from(uptime_ms).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(RelayEvent {
            id: RelayEventId::from_uuid(id),
            channel,
            state,
            source,
            uptime_ms,
            recorded_at,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO relay_events (id, channel, state, source, uptime_ms, recorded_at)
    VALUES (?, ?, ?, ?, ?, ?)
";

// keeps the newest `?` rows
const TRIM: &str = r"
    DELETE FROM relay_events
    WHERE rowid <= (SELECT MAX(rowid) FROM relay_events) - ?
";

// rowid follows insertion, which stays ordered when the wall clock jumps
const SELECT_RECENT: &str = "SELECT * FROM relay_events ORDER BY rowid DESC LIMIT ?";

/// Events kept by default, oldest dropped first.
pub const DEFAULT_RETENTION: u32 = 10_000;

/// `SQLite`-backed relay change history, capped at a fixed number of events.
pub struct SqliteRelayLogStore {
    pool: SqlitePool,
    retention: u32,
}

impl SqliteRelayLogStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep at most `retention` events (at least one).
    #[must_use]
    pub fn with_retention(mut self, retention: u32) -> Self {
        self.retention = retention.max(1);
        self
    }
}

impl RelayLogStore for SqliteRelayLogStore {
    async fn append(&self, event: RelayEvent) -> Result<(), MarthaError> {
        let uptime_ms = i64::try_from(event.uptime_ms).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        sqlx::query(INSERT)
            .bind(event.id.as_uuid())
            .bind(event.channel.name())
            .bind(event.state)
            .bind(event.source.as_str())
            .bind(uptime_ms)
            .bind(event.recorded_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        let trimmed = sqlx::query(TRIM)
            .bind(i64::from(self.retention))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?
            .rows_affected();
        tx.commit().await.map_err(StorageError::from)?;

        if trimmed > 0 {
            tracing::debug!(trimmed, retention = self.retention, "relay log trimmed");
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RelayEvent>, MarthaError> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
