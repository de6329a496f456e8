//! EchoRanger firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  GPTimer (1 MHz) ──alarm ISR──▶ OVERFLOWS (AtomicU32)    │
//! │        │                              │                  │
//! │        ▼                              ▼                  │
//! │  PulseTimer ◀── trigger GPIO    UltrasonicRanger ◀── echo│
//! │                                       │                  │
//! │                                  log output              │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::{AnyInputPin, AnyOutputPin, PinDriver, Pull};

use echoranger::config::RangerConfig;
use echoranger::drivers::hw_timer::{GptimerCounter, OVERFLOWS, PulseTimer};
use echoranger::pins;
use echoranger::sensors::UltrasonicRanger;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("EchoRanger v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = RangerConfig::default();
    config.validate()?;

    // ── 3. Peripherals ────────────────────────────────────────
    // SAFETY: each GPIO number from `pins` is claimed exactly once here.
    let trig_pin = unsafe { AnyOutputPin::new(pins::TRIG_GPIO) };
    let echo_pin = unsafe { AnyInputPin::new(pins::ECHO_GPIO) };

    let trigger = PinDriver::output(trig_pin)?;
    let mut echo = PinDriver::input(echo_pin)?;
    echo.set_pull(Pull::Up)?;

    let counter = GptimerCounter::new(config.counter_period_us).map_err(anyhow::Error::msg)?;
    let timer = PulseTimer::new(counter, trigger, Ets, &OVERFLOWS);
    let refresh_ms = config.refresh_interval_ms;
    let mut ranger = UltrasonicRanger::new(timer, echo, config);

    info!(
        "Ranger ready (trig=GPIO{}, echo=GPIO{}). Entering measurement loop.",
        pins::TRIG_GPIO,
        pins::ECHO_GPIO
    );

    // ── 4. Measurement loop ───────────────────────────────────
    loop {
        match ranger.measure() {
            Ok(m) => info!(
                "Distance: {} ({} samples, {} attempts)",
                m,
                m.samples.len(),
                m.stats.attempts
            ),
            Err(e) => warn!("Distance: no reading ({})", e),
        }
        FreeRtos::delay_ms(refresh_ms);
    }
}
