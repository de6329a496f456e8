//! EchoRanger firmware library.
//!
//! Exposes the pulse timer and ranging engine for integration testing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module; on the host the engine runs against any
//! `embedded-hal` pins and [`drivers::hw_timer::HwCounter`] implementation.

#![deny(unused_must_use)]

pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod sensors;

pub use error::{Error, Result};
