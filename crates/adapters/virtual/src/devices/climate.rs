//! Air in the tent: humidity, CO2, air and substrate temperatures, light.

use martha_domain::relay::{PinOutputs, RelayChannel};
use martha_domain::sensor::{
    Co2Reading, LIGHT_CHANNEL_COUNT, LightReading, RH_SHELF_COUNT, RhReading, SensorSnapshot,
    TEMP_PROBE_COUNT, TempProbeReading,
};
use martha_domain::time::Millis;

use super::approach;

const AMBIENT_RH: f32 = 55.0;
const AMBIENT_CO2: f32 = 420.0;
const AMBIENT_TEMP: f32 = 21.0;
const LIT_TEMP: f32 = 26.0;

const FOG_RH_PER_S: f32 = 1.5;
const DRY_RH_PER_S: f32 = 0.2;
const FAE_DRY_RH_PER_S: f32 = 0.3;
const FAE_CO2_PER_S: f32 = 15.0;
const RESPIRATION_CO2_PER_S: f32 = 2.0;
const MAX_CO2: f32 = 5_000.0;
const TEMP_PER_S: f32 = 0.01;

/// Shelf differences, so the three RH sensors do not read the same value.
const SHELF_RH_OFFSET: [f32; RH_SHELF_COUNT] = [0.0, -1.2, 0.8];
/// Substrate runs a little warmer or cooler than the air.
const PROBE_TEMP_OFFSET: [f32; TEMP_PROBE_COUNT] = [0.5, 0.3, 0.0, -0.2, 0.4];
const LIT_SPECTRUM: [u16; LIGHT_CHANNEL_COUNT] =
    [120, 340, 410, 620, 580, 450, 390, 260, 180, 1_900, 75];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub rh_pct: f32,
    pub co2_ppm: f32,
    pub air_temp_c: f32,
}

impl Default for Climate {
    fn default() -> Self {
        Self {
            rh_pct: 80.0,
            co2_ppm: 900.0,
            air_temp_c: 22.0,
        }
    }
}

impl Climate {
    pub fn step(&mut self, outputs: PinOutputs, dt_s: f32) {
        if outputs.get(RelayChannel::Fogger) {
            self.rh_pct = (self.rh_pct + FOG_RH_PER_S * dt_s).min(99.5);
        } else {
            self.rh_pct = approach(self.rh_pct, AMBIENT_RH, DRY_RH_PER_S * dt_s);
        }

        if outputs.get(RelayChannel::Exhaust) {
            self.co2_ppm = approach(self.co2_ppm, AMBIENT_CO2, FAE_CO2_PER_S * dt_s);
            self.rh_pct = approach(self.rh_pct, AMBIENT_RH, FAE_DRY_RH_PER_S * dt_s);
        } else {
            self.co2_ppm = (self.co2_ppm + RESPIRATION_CO2_PER_S * dt_s).min(MAX_CO2);
        }

        let target = if outputs.get(RelayChannel::Lights) {
            LIT_TEMP
        } else {
            AMBIENT_TEMP
        };
        self.air_temp_c = approach(self.air_temp_c, target, TEMP_PER_S * dt_s);
    }

    /// Sensor readings stamped `now`. Shelves listed in `failed_shelves`
    /// report invalid.
    pub fn readings(
        &self,
        outputs: PinOutputs,
        failed_shelves: [bool; RH_SHELF_COUNT],
        now: Millis,
        snapshot: &mut SensorSnapshot,
    ) {
        for (index, reading) in snapshot.rh.iter_mut().enumerate() {
            *reading = RhReading {
                rh_pct: (self.rh_pct + SHELF_RH_OFFSET[index]).clamp(0.0, 100.0),
                temp_c: self.air_temp_c,
                valid: !failed_shelves[index],
                timestamp_ms: now,
            };
        }
        snapshot.co2 = Co2Reading {
            co2_ppm: self.co2_ppm,
            temp_c: self.air_temp_c + 0.3,
            rh_pct: self.rh_pct,
            valid: true,
            timestamp_ms: now,
        };
        for (index, probe) in snapshot.temps.iter_mut().enumerate() {
            *probe = TempProbeReading {
                temp_c: self.air_temp_c + PROBE_TEMP_OFFSET[index],
                valid: true,
                timestamp_ms: now,
            };
        }
        snapshot.light = LightReading {
            channels: if outputs.get(RelayChannel::Lights) {
                LIT_SPECTRUM
            } else {
                [0; LIGHT_CHANNEL_COUNT]
            },
            valid: true,
            timestamp_ms: now,
        };
    }
}
