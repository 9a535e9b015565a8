//! PWM timer controller for the red/green and blue counters

use crate::hal::{HalError, PixelHal, PwmCounter};
use crate::types::{ColorChannel, CounterId, Prescaler, OFF};

/// Lifecycle of the counter pair
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Unconfigured,
    Stopped,
    Running,
}

/// Write the buffered compare value of one color channel
pub fn write_channel<H: PixelHal>(hal: &mut H, channel: ColorChannel, value: u8) -> Result<(), HalError> {
    match channel.counter() {
        CounterId::RedGreen => hal.rg_counter().write_compare(channel.compare_channel(), value),
        CounterId::Blue => hal.blue_counter().write_compare(channel.compare_channel(), value),
    }
}

/// Owns the start/stop protocol of both counters
#[derive(Debug)]
pub struct TimerController {
    state: TimerState,
    prescaler: Prescaler,
}

impl TimerController {
    pub const fn new(prescaler: Prescaler) -> Self {
        Self {
            state: TimerState::Unconfigured,
            prescaler,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// One-time counter setup; outputs parked high, overflow interrupt on
    pub fn configure<H: PixelHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        hal.rg_counter().configure()?;
        hal.blue_counter().configure()?;
        park(hal)?;
        hal.rg_counter()
            .set_overflow_interrupt(true)
            .map_err(|_| HalError::InterruptError)?;
        self.state = TimerState::Stopped;
        Ok(())
    }

    /// Start both counters from a known-off state
    pub fn start<H: PixelHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        match self.state {
            TimerState::Unconfigured => Err(HalError::NotInitialized),
            TimerState::Running => Ok(()),
            TimerState::Stopped => {
                park(hal)?;
                hal.rg_counter().connect_outputs()?;
                hal.blue_counter().connect_outputs()?;
                // Red/green last: its overflow drives the sequencer
                hal.blue_counter().start(self.prescaler)?;
                hal.rg_counter().start(self.prescaler)?;
                self.state = TimerState::Running;
                Ok(())
            }
        }
    }

    /// Stop both counter clocks
    pub fn halt<H: PixelHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        if self.state != TimerState::Running {
            return Ok(());
        }
        hal.rg_counter().stop()?;
        hal.blue_counter().stop()?;
        self.state = TimerState::Stopped;
        Ok(())
    }

    /// Park the outputs high and hand the pins back from the compare units
    pub fn release<H: PixelHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        if self.state == TimerState::Unconfigured {
            return Ok(());
        }
        hal.rg_counter().force_compare()?;
        hal.blue_counter().force_compare()?;
        hal.rg_counter().disconnect_outputs()?;
        hal.blue_counter().disconnect_outputs()
    }
}

/// Every compare at OFF, loaded into the active registers, outputs forced high
fn park<H: PixelHal>(hal: &mut H) -> Result<(), HalError> {
    for channel in ColorChannel::ALL {
        write_channel(hal, channel, OFF)?;
    }
    hal.rg_counter().reset_counter()?;
    hal.blue_counter().reset_counter()?;
    hal.rg_counter().force_compare()?;
    hal.blue_counter().force_compare()
}
