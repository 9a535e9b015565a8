//! CH32V203 Hardware Implementation
//!
//! Register-level pixel HAL: TIM3 drives red (CH1) and green (CH2) and owns
//! the refresh interrupt, TIM2 CH2 drives the blue charge pump.

use pixel_core::hal::{AnodeBank, DigitalLine, HalError, PixelHal, PwmCounter};
use pixel_core::types::{CompareChannel, Prescaler, PIXEL_COUNT};

/// CH32V203 Memory Map and Register Base Addresses
const RCC_BASE: u32 = 0x4002_1000;
const GPIOA_BASE: u32 = 0x4001_0800;
const GPIOB_BASE: u32 = 0x4001_0C00;
const TIM2_BASE: u32 = 0x4000_0000;
const TIM3_BASE: u32 = 0x4000_0400;
const PFIC_BASE: u32 = 0xE000_E000;

/// RCC Register offsets
const RCC_APB2PCENR: u32 = 0x18;
const RCC_APB1PCENR: u32 = 0x1C;

/// GPIO Register offsets
const GPIO_CFGLR: u32 = 0x00;
const GPIO_CFGHR: u32 = 0x04;
const GPIO_BSHR: u32 = 0x10;

/// GPIO pin modes (CNF + MODE nibble)
const MODE_INPUT_FLOATING: u32 = 0x4;
const MODE_OUTPUT_PUSH_PULL: u32 = 0x3;
const MODE_AF_PUSH_PULL: u32 = 0xB;

/// General-purpose timer register offsets
const TIM_CTLR1: u32 = 0x00;
const TIM_DMAINTENR: u32 = 0x0C;
const TIM_INTFR: u32 = 0x10;
const TIM_SWEVGR: u32 = 0x14;
const TIM_CHCTLR1: u32 = 0x18;
const TIM_CCER: u32 = 0x20;
const TIM_CNT: u32 = 0x24;
const TIM_PSC: u32 = 0x28;
const TIM_ATRLR: u32 = 0x2C;
const TIM_CH1CVR: u32 = 0x34;
const TIM_CH2CVR: u32 = 0x38;

const CTLR1_CEN: u32 = 1 << 0;
const CTLR1_URS: u32 = 1 << 2;
const CTLR1_ARPE: u32 = 1 << 7;
const UIF: u32 = 1 << 0;
const UG: u32 = 1 << 0;

/// Output compare modes
const OC_MODE_FORCE_ACTIVE: u32 = 0b101;
const OC_MODE_PWM1: u32 = 0b110;
const OC_PRELOAD: u32 = 1 << 3;

/// TIM3 global interrupt number
pub const TIM3_IRQN: u8 = 45;

#[inline(always)]
fn read_reg(addr: u32) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

#[inline(always)]
fn write_reg(addr: u32, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

#[inline(always)]
fn modify_reg(addr: u32, f: impl FnOnce(u32) -> u32) {
    write_reg(addr, f(read_reg(addr)));
}

/// One GPIO pin
#[derive(Copy, Clone, Debug)]
pub struct PinRef {
    port: u32,
    pin: u8,
}

impl PinRef {
    pub const fn new(port: u32, pin: u8) -> Self {
        Self { port, pin }
    }

    fn set_mode(&self, mode: u32) {
        let (reg, shift) = if self.pin < 8 {
            (GPIO_CFGLR, self.pin as u32 * 4)
        } else {
            (GPIO_CFGHR, (self.pin as u32 - 8) * 4)
        };
        modify_reg(self.port + reg, |cfg| (cfg & !(0xF << shift)) | (mode << shift));
    }
}

/// Push-pull GPIO line
pub struct Ch32Line {
    pin: PinRef,
}

impl Ch32Line {
    pub const fn new(port: u32, pin: u8) -> Self {
        Self {
            pin: PinRef::new(port, pin),
        }
    }
}

impl DigitalLine for Ch32Line {
    fn configure_as_output(&mut self) -> Result<(), HalError> {
        self.pin.set_mode(MODE_OUTPUT_PUSH_PULL);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), HalError> {
        write_reg(self.pin.port + GPIO_BSHR, 1 << self.pin.pin);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        write_reg(self.pin.port + GPIO_BSHR, 1 << (self.pin.pin + 16));
        Ok(())
    }

    fn release(&mut self) -> Result<(), HalError> {
        self.pin.set_mode(MODE_INPUT_FLOATING);
        Ok(())
    }
}

/// General-purpose timer in 8-bit inverted PWM mode
pub struct Ch32PwmCounter {
    base: u32,
    outputs: [Option<PinRef>; 2],
    irqn: Option<u8>,
}

impl Ch32PwmCounter {
    pub const fn new(base: u32, outputs: [Option<PinRef>; 2], irqn: Option<u8>) -> Self {
        Self { base, outputs, irqn }
    }

    fn reg(&self, offset: u32) -> u32 {
        self.base + offset
    }

    /// Output compare mode for every channel that has a pin
    fn set_output_mode(&self, mode: u32) {
        let mut mask = 0;
        let mut bits = 0;
        for (index, output) in self.outputs.iter().enumerate() {
            if output.is_some() {
                let shift = index as u32 * 8;
                mask |= 0xFF << shift;
                bits |= ((mode << 4) | OC_PRELOAD) << shift;
            }
        }
        modify_reg(self.reg(TIM_CHCTLR1), |ctl| (ctl & !mask) | bits);
    }

    fn ccer_bits(&self) -> u32 {
        self.outputs
            .iter()
            .enumerate()
            .filter(|(_, output)| output.is_some())
            .fold(0, |bits, (index, _)| bits | 1 << (index * 4))
    }
}

impl PwmCounter for Ch32PwmCounter {
    fn configure(&mut self) -> Result<(), HalError> {
        // Update events from UG must not raise the refresh interrupt
        write_reg(self.reg(TIM_CTLR1), CTLR1_URS | CTLR1_ARPE);
        write_reg(self.reg(TIM_ATRLR), 255);
        self.set_output_mode(OC_MODE_PWM1);
        Ok(())
    }

    fn write_compare(&mut self, channel: CompareChannel, value: u8) -> Result<(), HalError> {
        let offset = match channel {
            CompareChannel::A => TIM_CH1CVR,
            CompareChannel::B => TIM_CH2CVR,
        };
        // Output is high while CNT < CVR; 255 + 1 is never reached
        write_reg(self.reg(offset), value as u32 + 1);
        Ok(())
    }

    fn reset_counter(&mut self) -> Result<(), HalError> {
        write_reg(self.reg(TIM_CNT), 0);
        write_reg(self.reg(TIM_SWEVGR), UG);
        Ok(())
    }

    fn force_compare(&mut self) -> Result<(), HalError> {
        self.set_output_mode(OC_MODE_FORCE_ACTIVE);
        Ok(())
    }

    fn connect_outputs(&mut self) -> Result<(), HalError> {
        for output in self.outputs.iter().flatten() {
            output.set_mode(MODE_AF_PUSH_PULL);
        }
        let bits = self.ccer_bits();
        modify_reg(self.reg(TIM_CCER), |ccer| ccer | bits);
        Ok(())
    }

    fn disconnect_outputs(&mut self) -> Result<(), HalError> {
        let bits = self.ccer_bits();
        modify_reg(self.reg(TIM_CCER), |ccer| ccer & !bits);
        for output in self.outputs.iter().flatten() {
            output.set_mode(MODE_INPUT_FLOATING);
        }
        Ok(())
    }

    fn start(&mut self, prescaler: Prescaler) -> Result<(), HalError> {
        write_reg(self.reg(TIM_PSC), prescaler.divisor() - 1);
        // Load the prescaler now instead of at the first wrap
        write_reg(self.reg(TIM_SWEVGR), UG);
        self.set_output_mode(OC_MODE_PWM1);
        modify_reg(self.reg(TIM_CTLR1), |ctl| ctl | CTLR1_CEN);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HalError> {
        modify_reg(self.reg(TIM_CTLR1), |ctl| ctl & !CTLR1_CEN);
        write_reg(self.reg(TIM_INTFR), !UIF);
        Ok(())
    }

    fn set_overflow_interrupt(&mut self, enabled: bool) -> Result<(), HalError> {
        let irqn = self.irqn.ok_or(HalError::InterruptError)?;
        modify_reg(self.reg(TIM_DMAINTENR), |ie| if enabled { ie | UIF } else { ie & !UIF });

        // PFIC IENRx / IRERx, 32 interrupts per register
        let offset = if enabled { 0x100 } else { 0x180 };
        let reg = PFIC_BASE + offset + (irqn as u32 / 32) * 4;
        write_reg(reg, 1 << (irqn % 32));
        Ok(())
    }

    fn overflow_pending(&self) -> bool {
        read_reg(self.reg(TIM_INTFR)) & UIF != 0
    }
}

/// Clear the TIM3 update flag; called first thing in the interrupt
pub fn acknowledge_refresh_interrupt() {
    write_reg(TIM3_BASE + TIM_INTFR, !UIF);
}

/// CH32V203 pixel hardware
pub struct Ch32v203PixelHal {
    anodes: AnodeBank<Ch32Line, PIXEL_COUNT>,
    pump_sink: Ch32Line,
    debug: Ch32Line,
    rg: Ch32PwmCounter,
    blue: Ch32PwmCounter,
}

impl Ch32v203PixelHal {
    pub fn new() -> Self {
        let anodes = core::array::from_fn(|i| Ch32Line::new(pins::ANODE_PORT, pins::ANODE_PINS[i]));
        Self {
            anodes: AnodeBank::new(anodes),
            pump_sink: Ch32Line::new(GPIOA_BASE, pins::PUMP_SINK_PIN),
            debug: Ch32Line::new(GPIOA_BASE, pins::DEBUG_PIN),
            rg: Ch32PwmCounter::new(
                TIM3_BASE,
                [
                    Some(PinRef::new(GPIOA_BASE, pins::RED_PIN)),
                    Some(PinRef::new(GPIOA_BASE, pins::GREEN_PIN)),
                ],
                Some(TIM3_IRQN),
            ),
            blue: Ch32PwmCounter::new(TIM2_BASE, [None, Some(PinRef::new(GPIOA_BASE, pins::BLUE_PIN))], None),
        }
    }
}

impl Default for Ch32v203PixelHal {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelHal for Ch32v203PixelHal {
    type Anode = Ch32Line;
    type PumpSink = Ch32Line;
    type DebugLine = Ch32Line;
    type RgCounter = Ch32PwmCounter;
    type BlueCounter = Ch32PwmCounter;

    fn initialize(&mut self) -> Result<(), HalError> {
        // Bit 0 = AFIO, Bit 2 = GPIOA, Bit 3 = GPIOB
        modify_reg(RCC_BASE + RCC_APB2PCENR, |en| en | (1 << 0) | (1 << 2) | (1 << 3));
        // Bit 0 = TIM2, Bit 1 = TIM3
        modify_reg(RCC_BASE + RCC_APB1PCENR, |en| en | (1 << 0) | (1 << 1));

        #[cfg(feature = "defmt")]
        defmt::info!("CH32V203 pixel HAL initialized");

        Ok(())
    }

    fn anodes(&mut self) -> &mut AnodeBank<Ch32Line, PIXEL_COUNT> {
        &mut self.anodes
    }

    fn pump_sink(&mut self) -> &mut Ch32Line {
        &mut self.pump_sink
    }

    fn rg_counter(&mut self) -> &mut Ch32PwmCounter {
        &mut self.rg
    }

    fn blue_counter(&mut self) -> &mut Ch32PwmCounter {
        &mut self.blue
    }

    fn debug_line(&mut self) -> Option<&mut Ch32Line> {
        Some(&mut self.debug)
    }
}

/// CH32V203 pin configuration constants
pub mod pins {
    use super::GPIOB_BASE;

    /// Anodes on PB0-PB2 and PB10-PB12, pixel order
    pub const ANODE_PORT: u32 = GPIOB_BASE;
    pub const ANODE_PINS: [u8; 6] = [0, 1, 2, 10, 11, 12];

    /// Blue charge-pump drive (TIM2_CH2)
    pub const BLUE_PIN: u8 = 1; // PA1

    /// Charge-pump sink, low while charging
    pub const PUMP_SINK_PIN: u8 = 2; // PA2

    /// Overrun debug pulse
    pub const DEBUG_PIN: u8 = 3; // PA3

    /// Red cathode (TIM3_CH1)
    pub const RED_PIN: u8 = 6; // PA6

    /// Green cathode (TIM3_CH2)
    pub const GREEN_PIN: u8 = 7; // PA7
}

/// CH32V203 timing constants
pub mod clocks {
    /// Timer input clock after reset (HSI, no PLL)
    pub const TIMER_CLOCK_HZ: u32 = 8_000_000;
}
