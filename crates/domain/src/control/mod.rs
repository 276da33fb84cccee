//! Closed-loop climate control.
//!
//! Each loop reads its input, decides what its relays should be, and asks the
//! [`RelayBank`] to switch them. A loop never assumes a change happened: the
//! current state is always read back from the bank, so a refused command is
//! simply retried on the next tick.

pub mod co2;
pub mod humidity;
pub mod pump;
pub mod timer;

use crate::relay::{RelayBank, RelayChannel, RelayError, RelaySource, RelayStateEntry};
use crate::time::Millis;

/// What a loop did on one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Relays already match the wanted state.
    Steady,
    /// Input missing or invalid; relays held.
    NoData,
    /// A change is wanted but the loop's minimum interval has not elapsed.
    CoolingDown,
    /// The bank accepted the change.
    Switched(Vec<RelayStateEntry>),
    /// The bank refused the change; it will be retried.
    Rejected(RelayError),
}

impl LoopOutcome {
    /// Relay changes made on this tick.
    #[must_use]
    pub fn changes(&self) -> &[RelayStateEntry] {
        match self {
            Self::Switched(changes) => changes,
            _ => &[],
        }
    }
}

/// Switch a group of channels together, stopping at the first refusal.
fn switch_group(
    bank: &mut RelayBank,
    channels: &[RelayChannel],
    on: bool,
    source: RelaySource,
    now: Millis,
) -> LoopOutcome {
    let mut changes = Vec::with_capacity(channels.len());
    for channel in channels {
        match bank.set(*channel, on, source, now) {
            Ok(outcome) => changes.extend(outcome.changed()),
            Err(err) => return LoopOutcome::Rejected(err),
        }
    }
    LoopOutcome::Switched(changes)
}
