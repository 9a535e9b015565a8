//! Core data types for the pixel refresh engine

use crate::hal::Duration;

/// Number of physical pixels on the tile
pub const PIXEL_COUNT: usize = 6;

/// Number of phases in one pixel's refresh cycle
pub const PHASE_COUNT: usize = 5;

/// Compare value that keeps a cathode output high all period (LED off)
pub const OFF: u8 = 255;

/// Counter steps between two overflows (free-running 8-bit counter)
pub const STEPS_PER_OVERFLOW: u32 = 256;

/// Lowest refresh rate accepted by [`RefreshConfig::new`]
pub const MIN_REFRESH_HZ: u32 = 50;

/// Shortest phase accepted by [`RefreshConfig::new`], in microseconds.
/// The whole sequencer step has to fit in the dark window of one period.
pub const MIN_PHASE_MICROS: u64 = 100;

/// Timer cycles per full refresh of the default configuration
/// (prescaler 8 x 256 steps x 5 phases x 6 pixels).
pub const PIXEL_CYCLES_PER_FRAME: u32 = 8 * STEPS_PER_OVERFLOW * PHASE_COUNT as u32 * PIXEL_COUNT as u32;

/// Perceptual color, 0 = off and 255 = full intensity per channel
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    /// Intensity of a single channel
    pub const fn channel(&self, channel: ColorChannel) -> u8 {
        match channel {
            ColorChannel::Red => self.r,
            ColorChannel::Green => self.g,
            ColorChannel::Blue => self.b,
        }
    }
}

/// Cathode color channels
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorChannel {
    /// Direct-driven red cathode
    Red,
    /// Direct-driven green cathode
    Green,
    /// Blue cathode behind the charge pump
    Blue,
}

impl ColorChannel {
    pub const ALL: [ColorChannel; 3] = [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue];

    /// Counter that generates this channel's waveform
    pub const fn counter(&self) -> CounterId {
        match self {
            ColorChannel::Red | ColorChannel::Green => CounterId::RedGreen,
            ColorChannel::Blue => CounterId::Blue,
        }
    }

    /// Compare unit on that counter
    pub const fn compare_channel(&self) -> CompareChannel {
        match self {
            ColorChannel::Red => CompareChannel::A,
            ColorChannel::Green | ColorChannel::Blue => CompareChannel::B,
        }
    }
}

/// The two hardware counters
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterId {
    /// Counter 0: red on A, green on B, owns the overflow interrupt
    RedGreen,
    /// Counter 1: charge-pump drive on B
    Blue,
}

/// Output-compare unit of a counter
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompareChannel {
    A,
    B,
}

impl CompareChannel {
    pub const fn index(&self) -> usize {
        match self {
            CompareChannel::A => 0,
            CompareChannel::B => 1,
        }
    }
}

/// Counter clock prescaler
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1,
    Div8,
    Div64,
    Div256,
    Div1024,
}

impl Prescaler {
    /// Clock divisor applied before the counter
    pub const fn divisor(&self) -> u32 {
        match self {
            Prescaler::Div1 => 1,
            Prescaler::Div8 => 8,
            Prescaler::Div64 => 64,
            Prescaler::Div256 => 256,
            Prescaler::Div1024 => 1024,
        }
    }
}

/// Compare register values for one pixel, as stored and as latched by the
/// sequencer. [`OFF`] turns a channel off, lower values are brighter.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RawColor {
    /// All three channels off
    pub const OFF: RawColor = RawColor { r: OFF, g: OFF, b: OFF };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns true if no channel would light
    pub const fn is_off(&self) -> bool {
        self.r == OFF && self.g == OFF && self.b == OFF
    }

    /// Returns true if the blue channel needs the charge pump
    pub const fn has_blue(&self) -> bool {
        self.b != OFF
    }

    /// Compare value of a single channel
    pub const fn channel(&self, channel: ColorChannel) -> u8 {
        match channel {
            ColorChannel::Red => self.r,
            ColorChannel::Green => self.g,
            ColorChannel::Blue => self.b,
        }
    }

    /// Pack into one word so a pixel can be published in a single store
    pub const fn pack(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Inverse of [`RawColor::pack`]
    pub const fn unpack(bits: u32) -> Self {
        Self {
            r: (bits >> 16) as u8,
            g: (bits >> 8) as u8,
            b: bits as u8,
        }
    }
}

impl Default for RawColor {
    fn default() -> Self {
        Self::OFF
    }
}

/// Phases of one pixel's refresh cycle, named after what the hardware is
/// doing during the period that starts with the phase's interrupt.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "std", derive(Hash))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// All anodes off, pump charging if the pixel shows blue
    Charge,
    /// Pump drive idle, anode on, blue armed
    Rest,
    /// Blue lit; blue disarmed, red armed
    Blue,
    /// Red lit; red disarmed, green armed
    Red,
    /// Green lit; green disarmed, last phase of the pixel
    Green,
}

impl Phase {
    pub const ALL: [Phase; PHASE_COUNT] = [Phase::Charge, Phase::Rest, Phase::Blue, Phase::Red, Phase::Green];

    /// Position in the cycle, 0..PHASE_COUNT
    pub const fn index(&self) -> usize {
        match self {
            Phase::Charge => 0,
            Phase::Rest => 1,
            Phase::Blue => 2,
            Phase::Red => 3,
            Phase::Green => 4,
        }
    }

    /// Phase that follows this one, wrapping after [`Phase::Green`]
    pub const fn next(&self) -> Phase {
        match self {
            Phase::Charge => Phase::Rest,
            Phase::Rest => Phase::Blue,
            Phase::Blue => Phase::Red,
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Charge,
        }
    }

    /// Returns true for the last phase of a pixel
    pub const fn is_last(&self) -> bool {
        matches!(self, Phase::Green)
    }

    /// Returns true if the pixel's anode is on during this phase
    pub const fn anode_active(&self) -> bool {
        !matches!(self, Phase::Charge)
    }
}

/// Refresh timing configuration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct RefreshConfig {
    /// Timer input clock
    pub clock_hz: u32,
    /// Prescaler shared by both counters
    pub prescaler: Prescaler,
    /// Timer cycles per frame that timekeeping elsewhere was built around
    pub cycles_per_frame: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            clock_hz: 4_000_000,
            prescaler: Prescaler::Div8,
            cycles_per_frame: PIXEL_CYCLES_PER_FRAME,
        }
    }
}

impl RefreshConfig {
    /// Create a new configuration with validation
    pub fn new(clock_hz: u32, prescaler: Prescaler, cycles_per_frame: u32) -> Result<Self, &'static str> {
        if clock_hz == 0 {
            return Err("Clock frequency must be non-zero");
        }

        let config = Self {
            clock_hz,
            prescaler,
            cycles_per_frame,
        };

        if config.timer_cycles_per_frame() != cycles_per_frame {
            return Err("Cycles per frame does not match timer configuration");
        }
        if config.phase_micros() < MIN_PHASE_MICROS {
            return Err("Phase too short for the refresh interrupt");
        }
        if config.refresh_hz() < MIN_REFRESH_HZ {
            return Err("Refresh rate below flicker threshold");
        }

        Ok(config)
    }

    /// Timer cycles between two overflow interrupts
    pub const fn cycles_per_phase(&self) -> u32 {
        self.prescaler.divisor() * STEPS_PER_OVERFLOW
    }

    /// Timer cycles for one pass over every pixel, derived from the hardware setup
    pub const fn timer_cycles_per_frame(&self) -> u32 {
        self.cycles_per_phase() * PHASE_COUNT as u32 * PIXEL_COUNT as u32
    }

    fn phase_micros(&self) -> u64 {
        self.cycles_per_phase() as u64 * 1_000_000 / self.clock_hz as u64
    }

    /// Length of one phase (one PWM period)
    pub fn phase_duration(&self) -> Duration {
        Duration::from_micros(self.phase_micros())
    }

    /// Length of one full refresh
    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(self.timer_cycles_per_frame() as u64 * 1_000_000 / self.clock_hz as u64)
    }

    /// Whole frames per second
    pub fn refresh_hz(&self) -> u32 {
        self.clock_hz / self.timer_cycles_per_frame()
    }
}
