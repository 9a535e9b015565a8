//! Charge pump that lets the blue channel reach below its forward voltage

use crate::hal::{DigitalLine, HalError};

/// Charge pump states
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpState {
    /// Sink released, capacitor empty
    Idle,
    /// Sink pulled low, capacitor charging
    Charging,
    /// Sink released, charge held for the blue window
    Resting,
}

/// Charge pump sub-sequencer.
///
/// Charging is only legal while every anode is off. The caller enforces that
/// by only calling [`ChargePump::begin_charge`] from the anode-off phase.
#[derive(Debug)]
pub struct ChargePump {
    state: PumpState,
}

impl ChargePump {
    pub const fn new() -> Self {
        Self { state: PumpState::Idle }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_charging(&self) -> bool {
        self.state == PumpState::Charging
    }

    /// Start charging. `anodes_off` must hold for the whole charge window;
    /// with an anode on the sink is left idle and `InvalidConfig` returned.
    pub fn begin_charge<L: DigitalLine>(&mut self, sink: &mut L, anodes_off: bool) -> Result<(), HalError> {
        if !anodes_off {
            return Err(HalError::InvalidConfig);
        }
        sink.set_low()?;
        self.state = PumpState::Charging;
        Ok(())
    }

    /// End the charge window. Always drives the sink idle.
    pub fn rest<L: DigitalLine>(&mut self, sink: &mut L) -> Result<(), HalError> {
        sink.set_high()?;
        if self.state == PumpState::Charging {
            self.state = PumpState::Resting;
        }
        Ok(())
    }

    /// Blue window over, the capacitor has emptied through the LED
    pub fn discharged(&mut self) {
        if self.state == PumpState::Resting {
            self.state = PumpState::Idle;
        }
    }

    /// Drive the sink idle and forget any charge
    pub fn reset<L: DigitalLine>(&mut self, sink: &mut L) -> Result<(), HalError> {
        sink.set_high()?;
        self.state = PumpState::Idle;
        Ok(())
    }
}

impl Default for ChargePump {
    fn default() -> Self {
        Self::new()
    }
}
