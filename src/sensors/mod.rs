//! Sensor subsystem.
//!
//! The ultrasonic ranger is the only sensor on this board; it consumes the
//! pulse timer from [`crate::drivers::hw_timer`] and the echo input line.

pub mod ultrasonic;

pub use ultrasonic::{AttemptOutcome, AttemptStats, MeasureError, Measurement, UltrasonicRanger};
