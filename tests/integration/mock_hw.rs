//! Simulated sensor bench for integration tests.
//!
//! A single microsecond clock drives every mock: delays advance it, each
//! echo poll advances it by `poll_cost_us`, and the mock counter counts it
//! while enabled, calling `on_overflow()` on every wrap the way the real
//! GPTimer ISR does.  Each trigger falling edge starts the next scripted
//! echo.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use echoranger::config::RangerConfig;
use echoranger::drivers::hw_timer::{HwCounter, OverflowCounter, PulseTimer};
use echoranger::sensors::UltrasonicRanger;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin};

// ── Echo script ───────────────────────────────────────────────

/// What the sensor does after one trigger pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Echo {
    /// Echo goes high `delay_us` after the trigger and stays high `width_us`.
    Pulse { delay_us: u64, width_us: u64 },
    /// Echo never rises.
    Silent,
    /// Echo rises and never falls.
    StuckHigh { delay_us: u64 },
}

/// Standard echo for a target `width_us / 58` cm away.  Echo rises after
/// the sensor's ~200 us transmit burst.
pub fn echo(width_us: u64) -> Echo {
    Echo::Pulse { delay_us: 250, width_us }
}

// ── Bench ─────────────────────────────────────────────────────

struct BenchState {
    now_us: u64,
    poll_cost_us: u64,
    period: u32,
    raw: u32,
    counting: bool,
    script: VecDeque<Echo>,
    active: Option<(u64, Echo)>,
    trigger_high: bool,
    trigger_log: Vec<(u64, bool)>,
    delays: Vec<u32>,
    triggers: u32,
}

pub struct Bench {
    pub overflows: OverflowCounter,
    state: RefCell<BenchState>,
}

impl Bench {
    pub fn new(period: u32) -> Rc<Self> {
        Self::with_poll_cost(period, 1)
    }

    pub fn with_poll_cost(period: u32, poll_cost_us: u64) -> Rc<Self> {
        Rc::new(Self {
            overflows: OverflowCounter::new(),
            state: RefCell::new(BenchState {
                now_us: 0,
                poll_cost_us,
                period,
                raw: 0,
                counting: false,
                script: VecDeque::new(),
                active: None,
                trigger_high: false,
                trigger_log: Vec::new(),
                delays: Vec::new(),
                triggers: 0,
            }),
        })
    }

    /// Queue echoes for the next triggers.  An empty script means silence.
    pub fn script(&self, echoes: impl IntoIterator<Item = Echo>) {
        self.state.borrow_mut().script.extend(echoes);
    }

    pub fn advance(&self, us: u64) {
        let mut st = self.state.borrow_mut();
        st.now_us += us;
        if !st.counting {
            return;
        }
        let total = u64::from(st.raw) + us;
        let period = u64::from(st.period);
        for _ in 0..total / period {
            self.overflows.on_overflow();
        }
        st.raw = (total % period) as u32;
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now_us
    }

    pub fn triggers(&self) -> u32 {
        self.state.borrow().triggers
    }

    pub fn delays(&self) -> Vec<u32> {
        self.state.borrow().delays.clone()
    }

    pub fn trigger_log(&self) -> Vec<(u64, bool)> {
        self.state.borrow().trigger_log.clone()
    }

    pub fn counting(&self) -> bool {
        self.state.borrow().counting
    }

    fn echo_level(&self) -> bool {
        let st = self.state.borrow();
        let t = st.now_us;
        match st.active {
            None => false,
            Some((t0, Echo::Pulse { delay_us, width_us })) => {
                t >= t0 + delay_us && t < t0 + delay_us + width_us
            }
            Some((_, Echo::Silent)) => false,
            Some((t0, Echo::StuckHigh { delay_us })) => t >= t0 + delay_us,
        }
    }

    fn set_trigger(&self, high: bool) {
        let mut st = self.state.borrow_mut();
        let now = st.now_us;
        st.trigger_log.push((now, high));
        if st.trigger_high && !high {
            let next = st.script.pop_front().unwrap_or(Echo::Silent);
            st.active = Some((now, next));
            st.triggers += 1;
        }
        st.trigger_high = high;
    }
}

// ── Peripheral mocks ──────────────────────────────────────────

pub struct MockCounter(pub Rc<Bench>);

impl HwCounter for MockCounter {
    fn reset(&mut self) {
        self.0.state.borrow_mut().raw = 0;
    }
    fn enable(&mut self) {
        self.0.state.borrow_mut().counting = true;
    }
    fn disable(&mut self) {
        self.0.state.borrow_mut().counting = false;
    }
    fn read(&self) -> u32 {
        self.0.state.borrow().raw
    }
    fn period_us(&self) -> u32 {
        self.0.state.borrow().period
    }
}

pub struct MockTrigger(pub Rc<Bench>);

impl ErrorType for MockTrigger {
    type Error = Infallible;
}

impl OutputPin for MockTrigger {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set_trigger(false);
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set_trigger(true);
        Ok(())
    }
}

pub struct MockEcho(pub Rc<Bench>);

impl ErrorType for MockEcho {
    type Error = Infallible;
}

impl InputPin for MockEcho {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let level = self.0.echo_level();
        let cost = self.0.state.borrow().poll_cost_us;
        self.0.advance(cost);
        Ok(level)
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

pub struct MockDelay(pub Rc<Bench>);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }
    fn delay_us(&mut self, us: u32) {
        self.0.state.borrow_mut().delays.push(us);
        self.0.advance(u64::from(us));
    }
}

/// Echo line whose reads always fail.
pub struct FaultyEcho;

impl ErrorType for FaultyEcho {
    type Error = ErrorKind;
}

impl InputPin for FaultyEcho {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        Err(ErrorKind::Other)
    }
    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        Err(ErrorKind::Other)
    }
}

/// Trigger line whose writes always fail.
pub struct FaultyTrigger;

impl ErrorType for FaultyTrigger {
    type Error = ErrorKind;
}

impl OutputPin for FaultyTrigger {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        Err(ErrorKind::Other)
    }
    fn set_high(&mut self) -> Result<(), ErrorKind> {
        Err(ErrorKind::Other)
    }
}

// ── Builders ──────────────────────────────────────────────────

pub type BenchTimer<'a> = PulseTimer<'a, MockCounter, MockTrigger, MockDelay>;
pub type BenchRanger<'a> = UltrasonicRanger<'a, MockCounter, MockTrigger, MockDelay, MockEcho>;

pub fn timer(bench: &Rc<Bench>) -> BenchTimer<'_> {
    PulseTimer::new(
        MockCounter(bench.clone()),
        MockTrigger(bench.clone()),
        MockDelay(bench.clone()),
        &bench.overflows,
    )
}

pub fn ranger(bench: &Rc<Bench>, config: RangerConfig) -> BenchRanger<'_> {
    UltrasonicRanger::new(timer(bench), MockEcho(bench.clone()), config)
}
