//! Anode multiplexer and phase sequencer driven by the counter overflow

use crate::hal::{HalError, PixelHal, PwmCounter};
use crate::pump::{ChargePump, PumpState};
use crate::store::PixelStore;
use crate::timer::write_channel;
use crate::types::{ColorChannel, CompareChannel, Phase, RawColor, OFF, PIXEL_COUNT};

/// What one sequencer step did
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickOutcome {
    /// Pixel the step belonged to
    pub pixel: usize,
    /// Phase that was executed
    pub phase: Phase,
    /// Last phase of the last pixel: a full refresh just completed
    pub frame_complete: bool,
}

/// Five-phase per-pixel state machine.
///
/// Compare writes only take effect at the next counter wrap, so every color
/// is armed one phase before its window and turned off at the start of the
/// window after it:
///
/// | Phase  | Writes                                                  | Period shows |
/// |--------|---------------------------------------------------------|--------------|
/// | Charge | anodes off, latch store on pixel 0, pump charge if blue | nothing      |
/// | Rest   | pump idle, anode on, blue armed                         | nothing      |
/// | Blue   | blue off, red armed                                     | blue         |
/// | Red    | red off, green armed, pump discharged                   | red          |
/// | Green  | green off, advance pixel                                | green        |
#[derive(Debug)]
pub struct PhaseSequencer {
    pixel: usize,
    phase: Phase,
    pump: ChargePump,
    frame: [RawColor; PIXEL_COUNT],
    frames: u32,
}

impl PhaseSequencer {
    pub const fn new() -> Self {
        Self {
            pixel: 0,
            phase: Phase::Charge,
            pump: ChargePump::new(),
            frame: [RawColor::OFF; PIXEL_COUNT],
            frames: 0,
        }
    }

    /// Back to pixel 0, phase 0, nothing latched. The frame count is kept.
    pub fn reset(&mut self) {
        self.pixel = 0;
        self.phase = Phase::Charge;
        self.pump = ChargePump::new();
        self.frame = [RawColor::OFF; PIXEL_COUNT];
    }

    /// Pixel the next step will handle
    pub fn pixel(&self) -> usize {
        self.pixel
    }

    /// Phase the next step will execute
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pump_state(&self) -> PumpState {
        self.pump.state()
    }

    /// Completed refreshes since power-up
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Colors latched for the frame in progress
    pub fn latched(&self) -> &[RawColor; PIXEL_COUNT] {
        &self.frame
    }

    /// Drive the pump sink idle and forget any charge
    pub fn reset_pump<H: PixelHal>(&mut self, hal: &mut H) -> Result<(), HalError> {
        self.pump.reset(hal.pump_sink())
    }

    /// Run one phase. Called once per counter overflow.
    ///
    /// The position advances even if a write fails, so one bad line cannot
    /// freeze an anode on.
    pub fn tick<H: PixelHal>(&mut self, hal: &mut H, store: &PixelStore) -> Result<TickOutcome, HalError> {
        let pixel = self.pixel;
        let phase = self.phase;
        let written = self.program(hal, store, pixel, phase);
        let frame_complete = self.advance();
        written.map(|()| TickOutcome {
            pixel,
            phase,
            frame_complete,
        })
    }

    fn program<H: PixelHal>(
        &mut self,
        hal: &mut H,
        store: &PixelStore,
        pixel: usize,
        phase: Phase,
    ) -> Result<(), HalError> {
        match phase {
            Phase::Charge => {
                hal.anodes().deactivate_all()?;
                if pixel == 0 {
                    self.frame = store.snapshot();
                }
                if self.frame[pixel].has_blue() {
                    let anodes_off = hal.anodes().active().is_none();
                    self.pump.begin_charge(hal.pump_sink(), anodes_off)?;
                }
                Ok(())
            }
            Phase::Rest => {
                // Blind write, cheaper than checking whether we charged
                self.pump.rest(hal.pump_sink())?;
                hal.anodes().activate(pixel)?;
                hal.blue_counter().write_compare(CompareChannel::B, self.frame[pixel].b)
            }
            Phase::Blue => {
                write_channel(hal, ColorChannel::Blue, OFF)?;
                write_channel(hal, ColorChannel::Red, self.frame[pixel].r)
            }
            Phase::Red => {
                self.pump.discharged();
                write_channel(hal, ColorChannel::Red, OFF)?;
                write_channel(hal, ColorChannel::Green, self.frame[pixel].g)
            }
            Phase::Green => write_channel(hal, ColorChannel::Green, OFF),
        }
    }

    fn advance(&mut self) -> bool {
        let last = self.phase.is_last();
        self.phase = self.phase.next();
        if !last {
            return false;
        }
        self.pixel += 1;
        if self.pixel < PIXEL_COUNT {
            return false;
        }
        self.pixel = 0;
        self.frames = self.frames.wrapping_add(1);
        true
    }
}

impl Default for PhaseSequencer {
    fn default() -> Self {
        Self::new()
    }
}
