//! Relay channels and the safety-guarded [`RelayBank`].
//!
//! The bank is the only place relay state changes. It enforces:
//! - a boot lock: every channel is held off for [`BOOT_LOCK_MS`] after start,
//! - a UVC guard: the UV lamp stays off for another [`UVC_EXTRA_GUARD_MS`],
//! - manual mode: only user commands ([`RelaySource::Api`]) are accepted.
//!
//! Every accepted change is appended to a fixed-size log.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NotFoundError;
use crate::time::Millis;

pub const CHANNEL_COUNT: usize = 8;
pub const BOOT_LOCK_MS: Millis = 5_000;
pub const UVC_EXTRA_GUARD_MS: Millis = 5_000;
pub const RELAY_LOG_SIZE: usize = 32;

/// One of the eight relay outputs, in board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelayChannel {
    Fogger,
    TubFan,
    Exhaust,
    Intake,
    #[serde(rename = "UVC")]
    Uvc,
    Lights,
    Pump,
    Spare,
}

impl RelayChannel {
    pub const ALL: [Self; CHANNEL_COUNT] = [
        Self::Fogger,
        Self::TubFan,
        Self::Exhaust,
        Self::Intake,
        Self::Uvc,
        Self::Lights,
        Self::Pump,
        Self::Spare,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Fogger => "Fogger",
            Self::TubFan => "TubFan",
            Self::Exhaust => "Exhaust",
            Self::Intake => "Intake",
            Self::Uvc => "UVC",
            Self::Lights => "Lights",
            Self::Pump => "Pump",
            Self::Spare => "Spare",
        }
    }
}

impl fmt::Display for RelayChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RelayChannel {
    type Err = NotFoundError;

    /// Accepts a channel name (any case) or its index `0..=7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(index) = s.parse::<usize>() {
            return Self::from_index(index).ok_or_else(|| NotFoundError::channel(s));
        }
        Self::ALL
            .into_iter()
            .find(|ch| ch.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| NotFoundError::channel(s))
    }
}

/// Who asked for a relay change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelaySource {
    BootInit,
    Humidity,
    Co2,
    Timer,
    PumpCtrl,
    Api,
    ManualMode,
    Watchdog,
    Shutdown,
}

impl RelaySource {
    /// Automatic sources are suspended while the bank is in manual mode.
    #[must_use]
    pub fn is_automatic(self) -> bool {
        matches!(
            self,
            Self::Humidity | Self::Co2 | Self::Timer | Self::PumpCtrl | Self::Watchdog
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BootInit => "BootInit",
            Self::Humidity => "Humidity",
            Self::Co2 => "Co2",
            Self::Timer => "Timer",
            Self::PumpCtrl => "PumpCtrl",
            Self::Api => "Api",
            Self::ManualMode => "ManualMode",
            Self::Watchdog => "Watchdog",
            Self::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Display for RelaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelaySource {
    type Err = NotFoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::BootInit,
            Self::Humidity,
            Self::Co2,
            Self::Timer,
            Self::PumpCtrl,
            Self::Api,
            Self::ManualMode,
            Self::Watchdog,
            Self::Shutdown,
        ]
        .into_iter()
        .find(|src| src.as_str() == s)
        .ok_or_else(|| NotFoundError {
            entity: "relay source",
            id: s.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayBankState {
    BootLocked,
    Armed,
    ManualMode,
}

/// One entry of the relay change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStateEntry {
    pub channel: RelayChannel,
    pub state: bool,
    pub source: RelaySource,
    pub timestamp_ms: Millis,
}

/// Bit `N` set when channel `N` is commanded on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayMask(pub u8);

impl RelayMask {
    #[must_use]
    pub fn is_on(self, channel: RelayChannel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }
}

/// Commanded level per channel, in board order. `true` means energised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinOutputs(pub [bool; CHANNEL_COUNT]);

impl PinOutputs {
    #[must_use]
    pub fn get(&self, channel: RelayChannel) -> bool {
        self.0[channel.index()]
    }
}

/// Why the bank refused a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("relays are boot locked")]
    BootLocked,

    #[error("manual mode is active")]
    ManualMode,

    #[error("UVC boot guard is active")]
    UvcGuard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Changed(RelayStateEntry),
    Unchanged,
}

impl SetOutcome {
    #[must_use]
    pub fn changed(&self) -> Option<RelayStateEntry> {
        match self {
            Self::Changed(entry) => Some(*entry),
            Self::Unchanged => None,
        }
    }
}

/// The eight relays plus the boot/manual state machine guarding them.
#[derive(Debug, Clone)]
pub struct RelayBank {
    state: RelayBankState,
    relays: [bool; CHANNEL_COUNT],
    boot_ms: Millis,
    log: VecDeque<RelayStateEntry>,
}

impl RelayBank {
    /// All channels off and boot locked. Records one `BootInit` entry per channel.
    #[must_use]
    pub fn new(boot_ms: Millis) -> Self {
        let mut bank = Self {
            state: RelayBankState::BootLocked,
            relays: [false; CHANNEL_COUNT],
            boot_ms,
            log: VecDeque::with_capacity(RELAY_LOG_SIZE),
        };
        for channel in RelayChannel::ALL {
            bank.record(RelayStateEntry {
                channel,
                state: false,
                source: RelaySource::BootInit,
                timestamp_ms: boot_ms,
            });
        }
        bank
    }

    /// Leave the boot lock once the window has elapsed.
    pub fn tick(&mut self, now: Millis) {
        if self.state == RelayBankState::BootLocked
            && now.saturating_sub(self.boot_ms) >= BOOT_LOCK_MS
        {
            self.state = RelayBankState::Armed;
        }
    }

    /// Request a relay change.
    ///
    /// # Errors
    ///
    /// - [`RelayError::BootLocked`] before the bank is armed.
    /// - [`RelayError::ManualMode`] for automatic sources while in manual mode.
    /// - [`RelayError::UvcGuard`] for the UVC channel before the extended guard elapsed.
    pub fn set(
        &mut self,
        channel: RelayChannel,
        on: bool,
        source: RelaySource,
        now: Millis,
    ) -> Result<SetOutcome, RelayError> {
        match self.state {
            RelayBankState::BootLocked => return Err(RelayError::BootLocked),
            RelayBankState::ManualMode if source.is_automatic() => {
                return Err(RelayError::ManualMode);
            }
            _ => {}
        }

        if channel == RelayChannel::Uvc && self.is_uvc_guarded(now) {
            return Err(RelayError::UvcGuard);
        }

        if self.relays[channel.index()] == on {
            return Ok(SetOutcome::Unchanged);
        }

        self.relays[channel.index()] = on;
        let entry = RelayStateEntry {
            channel,
            state: on,
            source,
            timestamp_ms: now,
        };
        self.record(entry);
        Ok(SetOutcome::Changed(entry))
    }

    /// Enter or leave manual mode. Relay states are kept either way.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BootLocked`] while the boot lock is active.
    pub fn set_manual_mode(&mut self, enable: bool) -> Result<(), RelayError> {
        self.state = match (self.state, enable) {
            (RelayBankState::BootLocked, _) => return Err(RelayError::BootLocked),
            (_, true) => RelayBankState::ManualMode,
            (_, false) => RelayBankState::Armed,
        };
        Ok(())
    }

    /// Switch every channel off regardless of locks. Returns the changes made.
    pub fn force_all_off(&mut self, source: RelaySource, now: Millis) -> Vec<RelayStateEntry> {
        let mut changes = Vec::new();
        for channel in RelayChannel::ALL {
            if self.relays[channel.index()] {
                self.relays[channel.index()] = false;
                let entry = RelayStateEntry {
                    channel,
                    state: false,
                    source,
                    timestamp_ms: now,
                };
                self.record(entry);
                changes.push(entry);
            }
        }
        changes
    }

    #[must_use]
    pub fn get(&self, channel: RelayChannel) -> bool {
        self.relays[channel.index()]
    }

    #[must_use]
    pub fn mask(&self) -> RelayMask {
        let bits = RelayChannel::ALL
            .into_iter()
            .filter(|ch| self.get(*ch))
            .fold(0u8, |acc, ch| acc | (1 << ch.index()));
        RelayMask(bits)
    }

    #[must_use]
    pub fn outputs(&self) -> PinOutputs {
        PinOutputs(self.relays)
    }

    /// True once the boot lock has elapsed and manual mode is off.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state == RelayBankState::Armed
    }

    #[must_use]
    pub fn is_manual_mode(&self) -> bool {
        self.state == RelayBankState::ManualMode
    }

    #[must_use]
    pub fn state(&self) -> RelayBankState {
        self.state
    }

    #[must_use]
    pub fn boot_ms(&self) -> Millis {
        self.boot_ms
    }

    /// Recent changes, oldest first.
    pub fn log(&self) -> impl Iterator<Item = &RelayStateEntry> {
        self.log.iter()
    }

    fn is_uvc_guarded(&self, now: Millis) -> bool {
        now.saturating_sub(self.boot_ms) < BOOT_LOCK_MS + UVC_EXTRA_GUARD_MS
    }

    fn record(&mut self, entry: RelayStateEntry) {
        if self.log.len() == RELAY_LOG_SIZE {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}
