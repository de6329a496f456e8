//! Echo pulse timer: free-running hardware counter + overflow ISR counter.
//!
//! The hardware counter ticks at 1 MHz and wraps every `period_us` counts.
//! Each wrap fires an ISR that calls [`OverflowCounter::on_overflow`], so the
//! elapsed time of a window is
//!
//! ```text
//!   elapsed_us = overflows × period_us + raw_counter
//! ```
//!
//! The overflow count lives in an `AtomicU32`; the ISR is its only
//! concurrent writer, the measurement path reads and zeroes it.  Nothing
//! outside this module touches either counter directly; callers go through
//! [`PulseTimer::start_window`] / [`PulseTimer::stop_window`] /
//! [`PulseTimer::read_elapsed`].
//!
//! On ESP-IDF the counter is a GPTimer with an auto-reloading alarm
//! ([`GptimerCounter`]).  On host targets tests supply their own
//! [`HwCounter`] implementation.

use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::error::{Result, SensorError};

/// Trigger line must sit low this long before the pulse.
pub const TRIGGER_SETTLE_US: u32 = 2;
/// HC-SR04 ignores trigger pulses shorter than 10 us.
pub const TRIGGER_PULSE_US: u32 = 10;

// ── Hardware counter port ─────────────────────────────────────

/// A free-running up-counter clocked at 1 count per microsecond.
///
/// Implementations must invoke `on_overflow()` on the shared
/// [`OverflowCounter`] exactly once per wrap while enabled.
pub trait HwCounter {
    /// Set the raw count to zero.
    fn reset(&mut self);
    /// Start counting.
    fn enable(&mut self);
    /// Stop counting; the raw value stays readable.
    fn disable(&mut self);
    /// Current raw count, always `< period_us()`.
    fn read(&self) -> u32;
    /// Counts per wrap.
    fn period_us(&self) -> u32;
}

// ── Overflow counter ──────────────────────────────────────────

/// Wrap-event counter shared between the overflow ISR and the main path.
pub struct OverflowCounter(AtomicU32);

impl OverflowCounter {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Called from the counter ISR on each wrap.  Lock-free.
    pub fn on_overflow(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

impl Default for OverflowCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Overflow counter fed by the GPTimer alarm ISR.
/// `static` because ESP-IDF ISR callbacks cannot capture state.
pub static OVERFLOWS: OverflowCounter = OverflowCounter::new();

/// Reconstruct a window's duration from its overflow count and raw counter.
pub const fn elapsed_us(overflows: u32, raw: u32, period_us: u32) -> u64 {
    overflows as u64 * period_us as u64 + raw as u64
}

// ── Pulse timer ───────────────────────────────────────────────

/// Owns the trigger line, the echo counter and the delay provider.
pub struct PulseTimer<'a, C, P, D> {
    counter: C,
    trigger: P,
    delay: D,
    overflows: &'a OverflowCounter,
    window_open: bool,
}

impl<'a, C, P, D> PulseTimer<'a, C, P, D>
where
    C: HwCounter,
    P: OutputPin,
    D: DelayNs,
{
    /// Wrap the peripherals.  The counter is stopped and the trigger
    /// driven low so every later state can assume an idle line.
    pub fn new(mut counter: C, mut trigger: P, delay: D, overflows: &'a OverflowCounter) -> Self {
        counter.disable();
        if trigger.set_low().is_err() {
            log::warn!("hw_timer: could not park trigger line low");
        }
        Self {
            counter,
            trigger,
            delay,
            overflows,
            window_open: false,
        }
    }

    /// Send the 10 us trigger pulse that starts a sensor ranging cycle.
    pub fn emit_trigger_pulse(&mut self) -> Result<()> {
        self.trigger.set_low().map_err(|_| SensorError::GpioWriteFailed)?;
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trigger.set_high().map_err(|_| SensorError::GpioWriteFailed)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low().map_err(|_| SensorError::GpioWriteFailed)?;
        Ok(())
    }

    /// Zero both counters and start counting.
    ///
    /// Counting is disabled and interrupts are masked while the counters are
    /// cleared, so a wrap from a previous window cannot be attributed to this
    /// one.  Calling this on an open window restarts it.
    ///
    /// On ESP-IDF the mask comes from esp-idf-hal's `critical-section`
    /// implementation (enabled by the `espidf` feature).  An alarm already
    /// pending when the mask is taken still fires after it is released;
    /// [`RangerConfig::validate`](crate::config::RangerConfig::validate)
    /// requires `counter_period_us > rise_timeout_us` so the rise window
    /// that precedes every restart can never reach a wrap.
    pub fn start_window(&mut self) {
        let counter = &mut self.counter;
        let overflows = self.overflows;
        critical_section::with(|_| {
            counter.disable();
            counter.reset();
            overflows.reset();
            counter.enable();
        });
        self.window_open = true;
    }

    /// Stop counting.  The elapsed value stays readable until the next
    /// [`start_window`](Self::start_window).
    pub fn stop_window(&mut self) {
        self.counter.disable();
        self.window_open = false;
    }

    /// Duration of the last window.  Call after [`stop_window`](Self::stop_window).
    pub fn read_elapsed(&self) -> u64 {
        debug_assert!(!self.window_open, "read_elapsed on a running window");
        elapsed_us(self.overflows.count(), self.counter.read(), self.counter.period_us())
    }

    /// Live elapsed time of the open window, for deadline checks.
    ///
    /// The overflow count is sampled on both sides of the raw read; a wrap
    /// in between shows up as a mismatch and the read is retried.
    pub fn elapsed_now(&self) -> u64 {
        let period = self.counter.period_us();
        loop {
            let before = self.overflows.count();
            let raw = self.counter.read();
            if self.overflows.count() == before {
                return elapsed_us(before, raw, period);
            }
        }
    }

    /// Busy-wait pause on the timer's delay provider.
    pub fn settle(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open
    }

    /// Hand the peripherals back.
    pub fn release(self) -> (C, P, D) {
        (self.counter, self.trigger, self.delay)
    }
}

// ── ESP-IDF GPTimer backend ───────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::GptimerCounter;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::sys::*;

    use super::{HwCounter, OVERFLOWS};
    use crate::error::InitError;
    use crate::pins;

    /// Alarm ISR: the counter has reached `period` and auto-reloaded to 0.
    /// Runs in interrupt context; only touches the atomic.
    unsafe extern "C" fn overflow_isr(
        _timer: gptimer_handle_t,
        _event: *const gptimer_alarm_event_data_t,
        _ctx: *mut core::ffi::c_void,
    ) -> bool {
        OVERFLOWS.on_overflow();
        false // no higher-priority task woken
    }

    /// 1 MHz GPTimer wrapping every `period_us` counts.
    pub struct GptimerCounter {
        handle: gptimer_handle_t,
        period_us: u32,
        running: bool,
    }

    impl GptimerCounter {
        pub fn new(period_us: u32) -> Result<Self, InitError> {
            let mut handle: gptimer_handle_t = core::ptr::null_mut();

            // SAFETY: called once from main() before the measurement loop;
            // `handle` is written by the driver and owned by the returned value.
            unsafe {
                let cfg = gptimer_config_t {
                    clk_src: soc_periph_gptimer_clk_src_t_GPTIMER_CLK_SRC_DEFAULT,
                    direction: gptimer_count_direction_t_GPTIMER_COUNT_UP,
                    resolution_hz: pins::COUNTER_RESOLUTION_HZ,
                    ..Default::default()
                };
                let ret = gptimer_new_timer(&cfg, &mut handle);
                if ret != ESP_OK as esp_err_t {
                    return Err(InitError::TimerCreateFailed(ret));
                }

                let mut alarm = gptimer_alarm_config_t {
                    alarm_count: u64::from(period_us),
                    reload_count: 0,
                    ..Default::default()
                };
                alarm.flags.set_auto_reload_on_alarm(1);
                let ret = gptimer_set_alarm_action(handle, &alarm);
                if ret != ESP_OK as esp_err_t {
                    return Err(InitError::TimerAlarmFailed(ret));
                }

                let cbs = gptimer_event_callbacks_t {
                    on_alarm: Some(overflow_isr),
                };
                let ret = gptimer_register_event_callbacks(handle, &cbs, core::ptr::null_mut());
                if ret != ESP_OK as esp_err_t {
                    return Err(InitError::TimerCallbackFailed(ret));
                }

                let ret = gptimer_enable(handle);
                if ret != ESP_OK as esp_err_t {
                    return Err(InitError::TimerEnableFailed(ret));
                }
            }

            log::info!("hw_timer: gptimer @1MHz, wrap every {} us", period_us);
            Ok(Self { handle, period_us, running: false })
        }
    }

    impl HwCounter for GptimerCounter {
        fn reset(&mut self) {
            // SAFETY: handle is valid for the lifetime of self.
            let ret = unsafe { gptimer_set_raw_count(self.handle, 0) };
            if ret != ESP_OK as esp_err_t {
                log::error!("hw_timer: set_raw_count failed (rc={})", ret);
            }
        }

        fn enable(&mut self) {
            if self.running {
                return;
            }
            // SAFETY: handle is valid; timer was enabled in new().
            let ret = unsafe { gptimer_start(self.handle) };
            if ret == ESP_OK as esp_err_t {
                self.running = true;
            } else {
                log::error!("hw_timer: start failed (rc={})", ret);
            }
        }

        fn disable(&mut self) {
            // gptimer_stop on a stopped timer is an error; skip it.
            if !self.running {
                return;
            }
            // SAFETY: handle is valid and the timer is running.
            let ret = unsafe { gptimer_stop(self.handle) };
            if ret != ESP_OK as esp_err_t {
                log::error!("hw_timer: stop failed (rc={})", ret);
            }
            self.running = false;
        }

        fn read(&self) -> u32 {
            let mut count: u64 = 0;
            // SAFETY: handle is valid; `count` is a local out-parameter.
            let ret = unsafe { gptimer_get_raw_count(self.handle, &mut count) };
            if ret != ESP_OK as esp_err_t {
                log::error!("hw_timer: get_raw_count failed (rc={})", ret);
            }
            count as u32
        }

        fn period_us(&self) -> u32 {
            self.period_us
        }
    }

    impl Drop for GptimerCounter {
        fn drop(&mut self) {
            self.disable();
            // SAFETY: handle is valid and stopped; nothing uses it after drop.
            let ret = unsafe { gptimer_disable(self.handle) };
            if ret != ESP_OK as esp_err_t {
                log::error!("hw_timer: disable failed (rc={})", ret);
            }
            // SAFETY: as above; the handle is not used after this call.
            let ret = unsafe { gptimer_del_timer(self.handle) };
            if ret != ESP_OK as esp_err_t {
                log::error!("hw_timer: del_timer failed (rc={})", ret);
            }
        }
    }
}
