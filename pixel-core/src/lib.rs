#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # Pixel Core
//!
//! Refresh engine for six multiplexed RGB pixels driven by two PWM counters,
//! an anode scanner and a charge pump for blue.

pub mod types;
pub mod gamma;
pub mod store;
pub mod pump;
pub mod sequencer;
pub mod timer;
pub mod frame;
pub mod driver;
pub mod hal;

#[cfg(feature = "test-utils")]
pub mod test_utils;


pub use types::*;
pub use gamma::{map_channel, map_rgb};
pub use store::PixelStore;
pub use pump::{ChargePump, PumpState};
pub use sequencer::{PhaseSequencer, TickOutcome};
pub use timer::{TimerController, TimerState};
pub use frame::FrameNotifier;
pub use driver::{DriverState, PixelDriver};
pub use hal::{*, Instant, Duration};

/// Pixel core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default refresh configuration: 4 MHz timer clock, prescaler 8, about 65 Hz
pub fn default_config() -> RefreshConfig {
    RefreshConfig::default()
}
