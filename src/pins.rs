//! GPIO pin assignments for the EchoRanger board.
//!
//! Single source of truth: the firmware entry point references this module
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic sensor
// ---------------------------------------------------------------------------

/// Digital output: 10 us HIGH pulse starts a ranging cycle.
pub const TRIG_GPIO: i32 = 4;
/// Digital input (pull-up): HIGH for the duration of the echo.
/// The sensor runs at 5 V; route through a divider to keep this at 3.3 V.
pub const ECHO_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Echo counter (GPTimer)
// ---------------------------------------------------------------------------

/// Counter tick rate: 1 MHz, so 1 count = 1 us.
pub const COUNTER_RESOLUTION_HZ: u32 = 1_000_000;
