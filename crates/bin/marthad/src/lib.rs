//! # marthad
//!
//! Host-side pieces of the Martha daemon that the binary wires together and
//! the integration tests reuse.
//!
//! - [`config`]: `marthad.toml` plus `MARTHA_*` environment overrides
//! - [`logging`]: `tracing` subscriber whose level can change at runtime
//! - [`clock`]: monotonic uptime and the system wall clock

pub mod clock;
pub mod config;
pub mod logging;
