#![no_std]

//! Firmware library: CH32V203 pixel hardware, the refresh interrupt glue and tasks

pub use embassy_executor::Spawner;
pub use embassy_time::Duration;

pub use pixel_core::*;

// Re-export hardware implementations
pub use crate::ch32v203_hardware::*;
pub use crate::tasks::*;

// Display module: global driver owned by the refresh interrupt
pub mod display {
    use core::cell::RefCell;

    use critical_section::Mutex;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use pixel_core::{DriverState, FrameNotifier, HalError, PixelDriver, PixelStore, RefreshConfig};

    use crate::ch32v203_hardware::{acknowledge_refresh_interrupt, Ch32v203PixelHal};
    use crate::time_driver;

    pub type BoardDriver = PixelDriver<'static, Ch32v203PixelHal>;

    /// Colors, written by tasks and read by the refresh interrupt
    pub static STORE: PixelStore = PixelStore::new();

    /// Raised after every completed refresh with the running frame count
    pub static FRAME_SIGNAL: Signal<CriticalSectionRawMutex, u32> = Signal::new();

    static NOTIFIER: FrameNotifier = FrameNotifier::new(on_frame_complete);

    static DRIVER: Mutex<RefCell<Option<BoardDriver>>> = Mutex::new(RefCell::new(None));

    fn on_frame_complete() {
        FRAME_SIGNAL.signal(NOTIFIER.notifications());
    }

    /// Set up the hardware. All pixels off, refresh stopped.
    pub fn init(config: RefreshConfig) -> Result<(), HalError> {
        let mut driver = PixelDriver::new(Ch32v203PixelHal::new(), &STORE, config);
        driver.init()?;
        time_driver::set_phase_micros(config.phase_duration().as_micros() as u32);

        critical_section::with(|cs| {
            DRIVER.borrow(cs).replace(Some(driver));
        });
        Ok(())
    }

    pub fn set_color(pixel: usize, r: u8, g: u8, b: u8) {
        STORE.set_color(pixel, r, g, b);
    }

    pub fn set_all_colors(r: u8, g: u8, b: u8) {
        STORE.set_all(r, g, b);
    }

    /// Start the refresh (after init or after sleep)
    pub fn enable() -> Result<(), HalError> {
        with_driver(|driver| driver.enable())
    }

    /// Stop the refresh and park the pins before sleep
    pub fn disable() -> Result<(), HalError> {
        with_driver(|driver| driver.disable())
    }

    /// Refresh overruns so far
    pub fn overruns() -> u32 {
        critical_section::with(|cs| DRIVER.borrow(cs).borrow().as_ref().map_or(0, |driver| driver.overruns()))
    }

    fn with_driver(f: impl FnOnce(&mut BoardDriver) -> Result<(), HalError>) -> Result<(), HalError> {
        critical_section::with(|cs| match DRIVER.borrow(cs).borrow_mut().as_mut() {
            Some(driver) => f(driver),
            None => Err(HalError::NotInitialized),
        })
    }

    /// Body of the TIM3 update interrupt
    pub fn on_timer_overflow() {
        acknowledge_refresh_interrupt();

        let step = critical_section::with(|cs| {
            DRIVER.borrow(cs).borrow_mut().as_mut().map(|driver| {
                let enabled = driver.state() == DriverState::Enabled;
                let frames = driver.frames();
                let result = driver.on_overflow();
                (enabled, driver.frames() != frames, result)
            })
        });

        let Some((enabled, frame_complete, _result)) = step else {
            return;
        };

        // A failed write still took a phase
        if enabled {
            time_driver::on_refresh_tick();
        }
        // Hook runs outside the critical section
        if frame_complete {
            NOTIFIER.notify();
        }

        #[cfg(feature = "defmt")]
        if let Err(e) = _result {
            defmt::warn!("Pixel refresh error: {}", e);
        }
    }
}

// Embassy tasks module
pub mod tasks {
    use pixel_core::{Rgb, PIXEL_COUNT};

    use crate::display;

    /// Frames between two animation steps
    pub const FRAMES_PER_STEP: u32 = 4;

    /// Color wheel: 0..255 goes red, green, blue and back to red
    pub fn wheel(position: u8) -> Rgb {
        let position = 255 - position;
        match position {
            0..=84 => Rgb::new(255 - position * 3, 0, position * 3),
            85..=169 => {
                let position = position - 85;
                Rgb::new(0, position * 3, 255 - position * 3)
            }
            _ => {
                let position = position - 170;
                Rgb::new(position * 3, 255 - position * 3, 0)
            }
        }
    }

    /// Rotate a rainbow around the tile, one step every few refreshes
    #[embassy_executor::task]
    pub async fn animation_task() {
        #[cfg(feature = "defmt")]
        defmt::info!("Animation task started");

        let mut offset: u8 = 0;
        loop {
            let frame = display::FRAME_SIGNAL.wait().await;
            if frame % FRAMES_PER_STEP != 0 {
                continue;
            }

            for pixel in 0..PIXEL_COUNT {
                let color = wheel(offset.wrapping_add((pixel * 256 / PIXEL_COUNT) as u8));
                display::set_color(pixel, color.r, color.g, color.b);
            }
            offset = offset.wrapping_add(1);

            #[cfg(feature = "defmt")]
            defmt::trace!("Frame {}", frame);
        }
    }
}

// CH32V203 hardware module
pub mod ch32v203_hardware;

// Time driver for embassy
mod time_driver;
