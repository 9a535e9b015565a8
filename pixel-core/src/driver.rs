//! Pixel driver: lifecycle control and the overflow interrupt body

use crate::frame::FrameNotifier;
use crate::hal::{DigitalLine, HalError, PixelHal, PwmCounter};
use crate::sequencer::{PhaseSequencer, TickOutcome};
use crate::store::PixelStore;
use crate::timer::{TimerController, TimerState};
use crate::types::RefreshConfig;

/// Driver lifecycle
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// `init` not called yet
    Uninitialized,
    /// Hardware set up, refresh stopped
    Disabled,
    /// Refresh running
    Enabled,
}

/// Owns the pixel hardware and the sequencer.
///
/// The store is shared with whoever sets colors. `on_overflow` must be called
/// from the red/green counter's overflow interrupt and nowhere else.
pub struct PixelDriver<'a, H: PixelHal> {
    hal: H,
    store: &'a PixelStore,
    sequencer: PhaseSequencer,
    timers: TimerController,
    config: RefreshConfig,
    state: DriverState,
    overruns: u32,
    frame_notifier: Option<&'a FrameNotifier>,
}

impl<'a, H: PixelHal> PixelDriver<'a, H> {
    pub fn new(hal: H, store: &'a PixelStore, config: RefreshConfig) -> Self {
        Self {
            hal,
            store,
            sequencer: PhaseSequencer::new(),
            timers: TimerController::new(config.prescaler),
            config,
            state: DriverState::Uninitialized,
            overruns: 0,
            frame_notifier: None,
        }
    }

    /// Run `notifier` from `on_overflow` after each completed refresh
    pub fn with_frame_notifier(mut self, notifier: &'a FrameNotifier) -> Self {
        self.frame_notifier = Some(notifier);
        self
    }

    /// One-time hardware setup. Leaves every pixel off and the refresh stopped.
    pub fn init(&mut self) -> Result<(), HalError> {
        self.hal.initialize()?;
        self.hal.anodes().configure()?;

        // Set the level before switching direction so the sink never glitches low
        let sink = self.hal.pump_sink();
        sink.set_high()?;
        sink.configure_as_output()?;

        if let Some(debug) = self.hal.debug_line() {
            debug.set_low()?;
            debug.configure_as_output()?;
        }

        self.store.clear();
        self.timers.configure(&mut self.hal)?;
        self.sequencer.reset();
        self.state = DriverState::Disabled;

        #[cfg(feature = "defmt")]
        defmt::info!("Pixel driver initialized, {} Hz refresh", self.config.refresh_hz());

        Ok(())
    }

    /// Start refreshing from pixel 0, phase 0. No-op if already running.
    pub fn enable(&mut self) -> Result<(), HalError> {
        match self.state {
            DriverState::Uninitialized => Err(HalError::NotInitialized),
            DriverState::Enabled => Ok(()),
            DriverState::Disabled => {
                // Anodes were released by `disable`
                self.hal.anodes().configure()?;
                self.sequencer.reset();
                self.timers.start(&mut self.hal)?;
                self.state = DriverState::Enabled;

                #[cfg(feature = "defmt")]
                defmt::debug!("Pixel refresh enabled");

                Ok(())
            }
        }
    }

    /// Stop refreshing and leave the hardware safe for sleep. Colors are kept.
    ///
    /// The clock stops first so the interrupt cannot turn an anode back on
    /// while the lines are being parked.
    pub fn disable(&mut self) -> Result<(), HalError> {
        if self.state != DriverState::Enabled {
            return Ok(());
        }

        self.timers.halt(&mut self.hal)?;
        self.hal.anodes().deactivate_all()?;
        self.hal.anodes().release()?;
        self.sequencer.reset_pump(&mut self.hal)?;
        self.timers.release(&mut self.hal)?;
        self.state = DriverState::Disabled;

        #[cfg(feature = "defmt")]
        defmt::debug!("Pixel refresh disabled");

        Ok(())
    }

    /// Interrupt body. Returns `None` for a stray overflow while disabled.
    ///
    /// The sequencer advances even when a write fails, so the overrun check
    /// and the frame hook run before the write error is returned.
    pub fn on_overflow(&mut self) -> Result<Option<TickOutcome>, HalError> {
        if self.state != DriverState::Enabled {
            return Ok(None);
        }

        let frames = self.sequencer.frames();
        let ticked = self.sequencer.tick(&mut self.hal, self.store);
        let pulsed = self.check_overrun();

        if self.sequencer.frames() != frames {
            if let Some(notifier) = self.frame_notifier {
                notifier.notify();
            }
        }

        let outcome = ticked?;
        pulsed?;
        Ok(Some(outcome))
    }

    fn check_overrun(&mut self) -> Result<(), HalError> {
        if !self.hal.rg_counter().overflow_pending() {
            return Ok(());
        }
        self.overruns = self.overruns.wrapping_add(1);

        #[cfg(feature = "defmt")]
        defmt::warn!("Pixel refresh overrun, {} so far", self.overruns);

        match self.hal.debug_line() {
            Some(debug) => debug.pulse(),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn timer_state(&self) -> TimerState {
        self.timers.state()
    }

    /// Interrupt bodies that did not finish before the next overflow
    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Completed refreshes since power-up
    pub fn frames(&self) -> u32 {
        self.sequencer.frames()
    }

    pub fn sequencer(&self) -> &PhaseSequencer {
        &self.sequencer
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn store(&self) -> &'a PixelStore {
        self.store
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }
}
