//! Hardware-facing drivers.

pub mod hw_timer;
