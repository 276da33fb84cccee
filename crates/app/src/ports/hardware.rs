//! Hardware ports: everything the controller reads from or drives in the tent.

use std::future::Future;

use martha_domain::error::MarthaError;
use martha_domain::relay::PinOutputs;
use martha_domain::sensor::SensorSnapshot;
use martha_domain::time::Millis;

/// One poll of every climate sensor.
pub trait SensorSource {
    /// Read all sensors. Readings that failed are returned with `valid == false`.
    fn read(&self, now: Millis) -> impl Future<Output = Result<SensorSnapshot, MarthaError>> + Send;
}

/// Raw analog sample of the reservoir probe.
pub trait WaterLevelProbe {
    /// Probe voltage in millivolts, `None` when no sample could be taken.
    fn read_millivolts(&self) -> impl Future<Output = Result<Option<u32>, MarthaError>> + Send;
}

/// Writes the commanded relay levels to the outputs.
pub trait RelayDriver {
    /// Drive every channel to `outputs`. Must be idempotent.
    fn apply(&self, outputs: PinOutputs) -> impl Future<Output = Result<(), MarthaError>> + Send;
}

/// The full tent: sensors, water probe and relay outputs.
pub trait TentHardware: SensorSource + WaterLevelProbe + RelayDriver {}

impl<T: SensorSource + WaterLevelProbe + RelayDriver> TentHardware for T {}
