//! Unified error types for the EchoRanger firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! main loop's handling uniform.  All variants are `Copy` so they pass
//! through the sampling engine without allocation.
//!
//! Per-attempt echo faults (no echo, stuck high, out of range) are *not*
//! errors at this level: the sampling engine absorbs them and retries.
//! See [`crate::sensors::ultrasonic::AttemptOutcome`].

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor line could not be driven or read.
    Sensor(SensorError),
    /// Peripheral initialisation failed.
    Init(InitError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Trigger GPIO write failed.
    GpioWriteFailed,
    /// Echo GPIO read failed.
    GpioReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Init errors
// ---------------------------------------------------------------------------

/// Errors raised while bringing up the counter peripheral.
/// The payload is the raw `esp_err_t` return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    TimerCreateFailed(i32),
    TimerCallbackFailed(i32),
    TimerAlarmFailed(i32),
    TimerEnableFailed(i32),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimerCreateFailed(rc) => write!(f, "gptimer create failed (rc={rc})"),
            Self::TimerCallbackFailed(rc) => write!(f, "gptimer callback register failed (rc={rc})"),
            Self::TimerAlarmFailed(rc) => write!(f, "gptimer alarm config failed (rc={rc})"),
            Self::TimerEnableFailed(rc) => write!(f, "gptimer enable failed (rc={rc})"),
        }
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Self::Init(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
