//! HC-SR04 ultrasonic ranging engine.
//!
//! One [`measure`](UltrasonicRanger::measure) call runs up to
//! `max_attempts` trigger/echo cycles and averages the first
//! `samples_per_measurement` valid samples:
//!
//! ```text
//!   trigger ──▶ wait rise ──▶ open window ──▶ wait fall ──▶ close ──▶ cm
//!                  │ timeout                     │ timeout            │
//!                  ▼                             ▼                    ▼
//!               NoEcho                       StuckHigh        range check
//! ```
//!
//! Both edge waits are busy-polls bounded by a deadline in counter
//! microseconds, read from the same timer that measures the echo, so the
//! timeout does not depend on how fast the polling loop runs.
//!
//! Distance = round-trip time / 58 us per cm.  Samples outside
//! `[min_cm, max_cm]` are discarded, not clamped.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use log::{debug, warn};

use crate::config::{MAX_SAMPLES, RangerConfig};
use crate::drivers::hw_timer::{HwCounter, PulseTimer};
use crate::error::{Error, SensorError};

/// Convert an echo round-trip time to centimetres.
pub fn echo_to_cm(elapsed_us: u64, us_per_cm: f32) -> f32 {
    elapsed_us as f32 / us_per_cm
}

/// Inclusive range check against the sensor's rated window.
pub fn in_range(cm: f32, min_cm: f32, max_cm: f32) -> bool {
    cm >= min_cm && cm <= max_cm
}

/// What a single trigger/echo cycle produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    /// Valid distance in centimetres.
    Sample(f32),
    /// Echo never went high within `rise_timeout_us`.
    NoEcho,
    /// Echo stayed high past `fall_timeout_us`.
    StuckHigh,
    /// Echo timed fine but the distance is outside the rated range.
    OutOfRange(f32),
    /// The echo line could not be read.
    EchoFault(SensorError),
}

impl AttemptOutcome {
    /// Abandoned before a sample could be computed.
    fn abandoned_early(self) -> bool {
        matches!(self, Self::NoEcho | Self::StuckHigh | Self::EchoFault(_))
    }
}

/// Per-measurement tally of attempt outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptStats {
    pub attempts: u8,
    pub valid: u8,
    pub no_echo: u8,
    pub stuck_high: u8,
    pub out_of_range: u8,
    pub echo_faults: u8,
}

impl AttemptStats {
    fn record(&mut self, outcome: AttemptOutcome) {
        self.attempts = self.attempts.saturating_add(1);
        let slot = match outcome {
            AttemptOutcome::Sample(_) => &mut self.valid,
            AttemptOutcome::NoEcho => &mut self.no_echo,
            AttemptOutcome::StuckHigh => &mut self.stuck_high,
            AttemptOutcome::OutOfRange(_) => &mut self.out_of_range,
            AttemptOutcome::EchoFault(_) => &mut self.echo_faults,
        };
        *slot = slot.saturating_add(1);
    }
}

/// A successful (possibly partial) measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Mean of `samples`, in centimetres.
    pub distance_cm: f32,
    /// The valid samples that went into the mean, in acquisition order.
    pub samples: Vec<f32, MAX_SAMPLES>,
    pub stats: AttemptStats,
}

impl Measurement {
    /// Fewer samples than requested were collected before the budget ran out.
    pub fn is_partial(&self, requested: u8) -> bool {
        self.samples.len() < requested as usize
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} cm", self.distance_cm)
    }
}

/// Why a measurement produced no distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureError {
    /// Attempt budget exhausted without a single valid sample.
    NoValidSamples(AttemptStats),
    /// The trigger line could not be driven.
    Trigger(Error),
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoValidSamples(s) => write!(
                f,
                "no valid samples in {} attempts (no_echo={} stuck_high={} out_of_range={} echo_faults={})",
                s.attempts, s.no_echo, s.stuck_high, s.out_of_range, s.echo_faults
            ),
            Self::Trigger(e) => write!(f, "trigger failed: {e}"),
        }
    }
}

impl core::error::Error for MeasureError {}

/// Trigger/echo sampling engine for one sensor.
pub struct UltrasonicRanger<'a, C, P, D, E> {
    timer: PulseTimer<'a, C, P, D>,
    echo: E,
    config: RangerConfig,
    stats: AttemptStats,
}

impl<'a, C, P, D, E> UltrasonicRanger<'a, C, P, D, E>
where
    C: HwCounter,
    P: OutputPin,
    D: DelayNs,
    E: InputPin,
{
    /// `config` must already have passed [`RangerConfig::validate`].
    pub fn new(timer: PulseTimer<'a, C, P, D>, echo: E, config: RangerConfig) -> Self {
        Self {
            timer,
            echo,
            config,
            stats: AttemptStats::default(),
        }
    }

    /// Run attempts until `samples_per_measurement` valid samples are in or
    /// `max_attempts` is spent, and average what was collected.
    pub fn measure(&mut self) -> Result<Measurement, MeasureError> {
        let wanted = (self.config.samples_per_measurement as usize).min(MAX_SAMPLES);
        let mut samples: Vec<f32, MAX_SAMPLES> = Vec::new();
        self.stats = AttemptStats::default();

        while samples.len() < wanted && self.stats.attempts < self.config.max_attempts {
            let outcome = self.attempt().map_err(MeasureError::Trigger)?;
            self.stats.record(outcome);

            match outcome {
                AttemptOutcome::Sample(cm) => {
                    if samples.push(cm).is_err() {
                        break;
                    }
                }
                other => debug!("ranger: attempt {} discarded: {:?}", self.stats.attempts, other),
            }

            if self.config.settle_on_failure || !outcome.abandoned_early() {
                self.timer.settle(self.config.settle_us);
            }
        }

        if samples.is_empty() {
            warn!("ranger: measurement failed after {} attempts", self.stats.attempts);
            return Err(MeasureError::NoValidSamples(self.stats));
        }

        let distance_cm = samples.iter().sum::<f32>() / samples.len() as f32;
        debug!(
            "ranger: {:.1} cm from {}/{} samples in {} attempts",
            distance_cm,
            samples.len(),
            wanted,
            self.stats.attempts
        );
        Ok(Measurement {
            distance_cm,
            samples,
            stats: self.stats,
        })
    }

    /// Mean distance in centimetres, or `0.0` when no reading was obtained.
    ///
    /// `0.0` means "no reading", never "object at zero distance"; use
    /// [`measure`](Self::measure) to tell the two apart.
    pub fn measure_distance(&mut self) -> f32 {
        self.measure().map_or(0.0, |m| m.distance_cm)
    }

    /// One trigger/echo cycle.  Only a trigger GPIO failure is an error;
    /// every echo problem is reported as an [`AttemptOutcome`].
    pub fn attempt(&mut self) -> Result<AttemptOutcome, Error> {
        self.timer.emit_trigger_pulse()?;

        // Rising edge, timed on the echo counter itself.
        self.timer.start_window();
        loop {
            match self.echo.is_high() {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => return Ok(self.echo_fault()),
            }
            if self.timer.elapsed_now() > u64::from(self.config.rise_timeout_us) {
                self.timer.stop_window();
                return Ok(AttemptOutcome::NoEcho);
            }
        }

        // Echo window proper: restart from zero at the rising edge.
        self.timer.start_window();
        loop {
            match self.echo.is_high() {
                Ok(false) => break,
                Ok(true) => {}
                Err(_) => return Ok(self.echo_fault()),
            }
            if self.timer.elapsed_now() > u64::from(self.config.fall_timeout_us) {
                self.timer.stop_window();
                return Ok(AttemptOutcome::StuckHigh);
            }
        }
        self.timer.stop_window();

        let cm = echo_to_cm(self.timer.read_elapsed(), self.config.us_per_cm);
        if in_range(cm, self.config.min_cm, self.config.max_cm) {
            Ok(AttemptOutcome::Sample(cm))
        } else {
            Ok(AttemptOutcome::OutOfRange(cm))
        }
    }

    fn echo_fault(&mut self) -> AttemptOutcome {
        self.timer.stop_window();
        let e = SensorError::GpioReadFailed;
        warn!("ranger: echo read failed: {}", e);
        AttemptOutcome::EchoFault(e)
    }

    /// Outcome tally of the most recent [`measure`](Self::measure).
    pub fn stats(&self) -> AttemptStats {
        self.stats
    }

    pub fn config(&self) -> &RangerConfig {
        &self.config
    }

    /// Tear down and hand back the timer and echo line.
    pub fn release(self) -> (PulseTimer<'a, C, P, D>, E) {
        (self.timer, self.echo)
    }
}
