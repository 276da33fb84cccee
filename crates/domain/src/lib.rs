//! # martha-domain
//!
//! Pure domain model for the Martha tent controller.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, uptime and wall-clock time
//! - Define **relay channels** and the safety-guarded [`RelayBank`](relay::RelayBank)
//!   (boot lock, UVC guard, manual override, change log)
//! - Define **sensor readings** and the aggregated [`SensorSnapshot`](sensor::SensorSnapshot)
//! - Define the **control loops** (humidity, CO2/FAE, pump, lights/UVC timer)
//! - Define the persisted **controller configuration** and its validation rules
//! - Derived metrics: VPD, rolling averages, water level calibration
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod config;
pub mod control;
pub mod event;
pub mod relay;
pub mod rolling_average;
pub mod sensor;
pub mod vpd;
pub mod water_level;
