//! Ranging configuration parameters
//!
//! All tunable parameters for the trigger/echo sampling engine.
//! `Default` reproduces the reference HC-SR04 timing; a JSON blob may
//! override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on `samples_per_measurement` (capacity of the sample buffer).
pub const MAX_SAMPLES: usize = 16;

/// Core ranging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangerConfig {
    // --- Averaging ---
    /// Valid samples averaged into one measurement
    pub samples_per_measurement: u8,
    /// Hard cap on trigger/echo attempts per measurement
    pub max_attempts: u8,

    // --- Echo deadlines (counter microseconds) ---
    /// Max wait for the echo rising edge after the trigger.  The sensor
    /// emits its 8-cycle 40 kHz burst (~200 us) before raising echo, so this
    /// must sit well above that.
    pub rise_timeout_us: u32,
    /// Max echo high time before the attempt is abandoned
    pub fall_timeout_us: u32,

    // --- Pacing ---
    /// Pause after an attempt to let acoustic ringing decay
    pub settle_us: u32,
    /// Also settle after attempts abandoned on an edge timeout
    pub settle_on_failure: bool,
    /// Interval between measurements in the firmware main loop
    pub refresh_interval_ms: u32,

    // --- Conversion ---
    /// Round-trip microseconds per centimetre of range
    pub us_per_cm: f32,
    /// Smallest accepted distance (cm)
    pub min_cm: f32,
    /// Largest accepted distance (cm)
    pub max_cm: f32,

    // --- Counter ---
    /// Full-scale period of the hardware counter in microseconds
    pub counter_period_us: u32,
}

impl Default for RangerConfig {
    fn default() -> Self {
        Self {
            // Averaging
            samples_per_measurement: 5,
            max_attempts: 20,

            // Deadlines
            rise_timeout_us: 2_000,
            fall_timeout_us: 30_000, // 400 cm ≈ 23_200 us, plus margin

            // Pacing
            settle_us: 200,
            settle_on_failure: true,
            refresh_interval_ms: 300,

            // Conversion
            us_per_cm: 58.0,
            min_cm: 2.0,
            max_cm: 400.0,

            // 16-bit counter at 1 MHz
            counter_period_us: 65_535,
        }
    }
}

impl RangerConfig {
    /// Parse a (possibly partial) JSON override and validate it.
    /// Missing fields keep their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make the sampling engine misbehave.
    /// Out-of-range values are refused, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_measurement == 0 {
            return Err(Error::Config("samples_per_measurement must be > 0"));
        }
        if self.samples_per_measurement as usize > MAX_SAMPLES {
            return Err(Error::Config("samples_per_measurement exceeds sample buffer"));
        }
        if self.max_attempts < self.samples_per_measurement {
            return Err(Error::Config("max_attempts below samples_per_measurement"));
        }
        if self.rise_timeout_us == 0 || self.fall_timeout_us == 0 {
            return Err(Error::Config("echo timeouts must be > 0"));
        }
        if !(self.us_per_cm.is_finite() && self.us_per_cm > 0.0) {
            return Err(Error::Config("us_per_cm must be positive"));
        }
        if !(self.min_cm.is_finite() && self.max_cm.is_finite()) || self.min_cm < 0.0 {
            return Err(Error::Config("distance window must be finite and non-negative"));
        }
        if self.min_cm >= self.max_cm {
            return Err(Error::Config("min_cm must be below max_cm"));
        }
        if self.counter_period_us <= self.rise_timeout_us {
            // A wrap during the rise wait could leave an alarm pending across
            // the window restart at the rising edge.
            return Err(Error::Config("counter_period_us must exceed rise_timeout_us"));
        }
        Ok(())
    }
}
