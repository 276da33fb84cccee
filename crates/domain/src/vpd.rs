//! Vapour pressure deficit.
//!
//! Uses the Tetens approximation for saturated vapour pressure. Results are in
//! kPa.

/// Saturated vapour pressure in kPa at `temp_c`.
#[must_use]
pub fn saturated_vapour_pressure(temp_c: f32) -> f32 {
    0.6108 * ((17.27 * temp_c) / (temp_c + 237.3)).exp()
}

/// VPD in kPa. Returns `0.0` when `rh_pct` is outside `0..=100`.
#[must_use]
pub fn vapour_pressure_deficit(temp_c: f32, rh_pct: f32) -> f32 {
    if !(0.0..=100.0).contains(&rh_pct) {
        return 0.0;
    }
    saturated_vapour_pressure(temp_c) * (1.0 - rh_pct / 100.0)
}
