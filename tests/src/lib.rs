//! Host-side integration tests for the pixel refresh engine
//!
//! Everything runs against the recording mock hardware from `pixel-core`,
//! driven period by period by a simulated counter.

// Host critical-section impl for the embassy mock clock
use critical_section as _;

use pixel_core::hal::mock::MockPixelHal;
use pixel_core::{HalError, PixelDriver, PixelStore, RefreshConfig, Rgb, PIXEL_COUNT};

pub use pixel_core::test_utils::electrical::{check_electrical_safety, Violation};
pub use pixel_core::test_utils::period_capture::{PeriodCapture, PeriodRecord};
pub use pixel_core::test_utils::test_scenarios;
pub use pixel_core::test_utils::tick_source::{SimulatedClock, TICKS_PER_FRAME};

pub type MockDriver<'a> = PixelDriver<'a, MockPixelHal>;

/// Initialized and enabled driver on fresh mock hardware
pub fn running_driver(store: &PixelStore) -> Result<MockDriver<'_>, HalError> {
    let mut driver = PixelDriver::new(MockPixelHal::new(), store, RefreshConfig::default());
    driver.init()?;
    driver.enable()?;
    Ok(driver)
}

/// Write a whole scene through the public color path
pub fn apply_scene(store: &PixelStore, scene: &[Rgb; PIXEL_COUNT]) {
    for (pixel, color) in scene.iter().enumerate() {
        store.set_rgb(pixel, *color);
    }
}

/// Pixels that lit at least once during the capture, in first-lit order
pub fn lit_pixels(capture: &PeriodCapture) -> heapless::Vec<usize, PIXEL_COUNT> {
    let mut pixels = heapless::Vec::new();
    for (_, pixel, _) in capture.windows() {
        if !pixels.contains(&pixel) {
            let _ = pixels.push(pixel);
        }
    }
    pixels
}

#[cfg(test)]
mod sequencing_tests;


#[cfg(test)]
mod mapper_tests;

#[cfg(test)]
mod frame_sync_tests;

#[cfg(test)]
mod line_adapter_tests;
