//! Relay event: a durable record of one accepted relay change.
//!
//! Produced by the controller for every [`RelayStateEntry`] the bank accepts,
//! published on the relay event bus and written to the relay log store.

use serde::{Deserialize, Serialize};

use crate::id::RelayEventId;
use crate::relay::{RelayChannel, RelaySource, RelayStateEntry};
use crate::time::{Millis, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEvent {
    pub id: RelayEventId,
    pub channel: RelayChannel,
    pub state: bool,
    pub source: RelaySource,
    /// Controller uptime when the change was made.
    pub uptime_ms: Millis,
    pub recorded_at: Timestamp,
}

impl RelayEvent {
    #[must_use]
    pub fn from_entry(entry: RelayStateEntry, recorded_at: Timestamp) -> Self {
        Self {
            id: RelayEventId::new(),
            channel: entry.channel,
            state: entry.state,
            source: entry.source,
            uptime_ms: entry.timestamp_ms,
            recorded_at,
        }
    }
}
