//! Simulated devices of the tent.
//!
//! Each device advances its own physics by `dt_s` seconds given the relay
//! outputs that were active during that interval.

mod climate;
mod reservoir;

pub use climate::Climate;
pub use reservoir::Reservoir;

use martha_domain::time::Millis;

/// Seconds between two uptimes, `0.0` when time went backwards.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn elapsed_s(from: Millis, to: Millis) -> f32 {
    to.saturating_sub(from) as f32 / 1_000.0
}

/// Move `value` toward `target` by at most `step`.
pub(crate) fn approach(value: f32, target: f32, step: f32) -> f32 {
    if value < target {
        (value + step).min(target)
    } else {
        (value - step).max(target)
    }
}
