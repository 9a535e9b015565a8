//! Hardware Abstraction Layer for the pixel refresh engine

// Re-export time types based on feature
#[cfg(feature = "embassy-time")]
pub use embassy_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
pub use self::mock_time::{Duration, Instant};

#[cfg(not(feature = "embassy-time"))]
mod mock_time {
    /// Mock instant type for compilation without embassy-time
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Instant(u64);

    impl Instant {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub fn duration_since(&self, other: Instant) -> Duration {
            Duration::from_micros(self.0.saturating_sub(other.0))
        }

        pub fn as_micros(&self) -> u64 {
            self.0
        }

        pub fn as_millis(&self) -> u64 {
            self.0 / 1000
        }
    }

    impl core::ops::Add<Duration> for Instant {
        type Output = Instant;

        fn add(self, rhs: Duration) -> Instant {
            Instant(self.0 + rhs.0)
        }
    }

    /// Mock duration type, microsecond resolution
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Duration(u64);

    impl Duration {
        pub const fn from_micros(us: u64) -> Self {
            Self(us)
        }

        pub const fn from_millis(ms: u64) -> Self {
            Self(ms * 1000)
        }

        pub fn as_micros(&self) -> u64 {
            self.0
        }

        pub fn as_millis(&self) -> u64 {
            self.0 / 1000
        }
    }

    impl core::ops::Mul<u32> for Duration {
        type Output = Duration;

        fn mul(self, rhs: u32) -> Duration {
            Duration(self.0 * rhs as u64)
        }
    }
}

use embedded_hal::digital::OutputPin;
use crate::types::{CompareChannel, Prescaler, PIXEL_COUNT};

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Counter/compare operation failed
    TimerError,
    /// Interrupt configuration failed
    InterruptError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::TimerError => write!(f, "Timer operation failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// A push-pull digital line (anode driver, pump sink, debug pin)
pub trait DigitalLine {
    /// Switch the line to output mode
    fn configure_as_output(&mut self) -> Result<(), HalError>;

    /// Drive the line high
    fn set_high(&mut self) -> Result<(), HalError>;

    /// Drive the line low
    fn set_low(&mut self) -> Result<(), HalError>;

    /// Stop driving the line so no current leaks while powered down
    fn release(&mut self) -> Result<(), HalError>;

    /// Emit a short high pulse
    fn pulse(&mut self) -> Result<(), HalError> {
        self.set_high()?;
        self.set_low()
    }
}

/// One free-running 8-bit counter with two inverted output-compare channels.
///
/// Outputs go high at wrap and low on compare match, so a compare of
/// [`crate::types::OFF`] keeps the output high (LED off) for the whole
/// period. Compare writes are buffered and take effect at the next wrap.
pub trait PwmCounter {
    /// Put the counter in PWM mode with buffered compares, clock stopped
    fn configure(&mut self) -> Result<(), HalError>;

    /// Write the buffered compare value of a channel
    fn write_compare(&mut self, channel: CompareChannel, value: u8) -> Result<(), HalError>;

    /// Zero the count and load buffered compares into the active registers
    fn reset_counter(&mut self) -> Result<(), HalError>;

    /// Force an immediate compare match, parking outputs high
    fn force_compare(&mut self) -> Result<(), HalError>;

    /// Hand the output pins to the compare units
    fn connect_outputs(&mut self) -> Result<(), HalError>;

    /// Take the output pins back from the compare units
    fn disconnect_outputs(&mut self) -> Result<(), HalError>;

    /// Start counting with the given prescaler
    fn start(&mut self, prescaler: Prescaler) -> Result<(), HalError>;

    /// Stop the counter clock
    fn stop(&mut self) -> Result<(), HalError>;

    /// Enable or disable the overflow interrupt
    fn set_overflow_interrupt(&mut self, enabled: bool) -> Result<(), HalError>;

    /// Returns true if another overflow happened since the current one was taken
    fn overflow_pending(&self) -> bool;
}

/// Complete pixel hardware interface
pub trait PixelHal {
    type Anode: DigitalLine;
    type PumpSink: DigitalLine;
    type DebugLine: DigitalLine;
    type RgCounter: PwmCounter;
    type BlueCounter: PwmCounter;

    /// Initialize hardware (clocks, pin muxing)
    fn initialize(&mut self) -> Result<(), HalError>;

    /// Access to the anode table
    fn anodes(&mut self) -> &mut AnodeBank<Self::Anode, PIXEL_COUNT>;

    /// Access to the charge-pump sink (low = charging)
    fn pump_sink(&mut self) -> &mut Self::PumpSink;

    /// Access to the red/green counter, which owns the overflow interrupt
    fn rg_counter(&mut self) -> &mut Self::RgCounter;

    /// Access to the blue charge-pump counter
    fn blue_counter(&mut self) -> &mut Self::BlueCounter;

    /// Access to the overrun debug line, if the board has one
    fn debug_line(&mut self) -> Option<&mut Self::DebugLine>;
}

/// Table of anode lines indexed by pixel
pub struct AnodeBank<L, const N: usize> {
    lines: [L; N],
    active: Option<usize>,
}

impl<L, const N: usize> AnodeBank<L, N>
where
    L: DigitalLine,
{
    pub fn new(lines: [L; N]) -> Self {
        Self { lines, active: None }
    }

    /// Make every anode an output, driven low
    pub fn configure(&mut self) -> Result<(), HalError> {
        for line in self.lines.iter_mut() {
            line.configure_as_output()?;
            line.set_low()?;
        }
        self.active = None;
        Ok(())
    }

    /// Turn on one anode. Any other active anode is switched off first.
    pub fn activate(&mut self, index: usize) -> Result<(), HalError> {
        if index >= N {
            return Err(HalError::InvalidConfig);
        }
        if let Some(current) = self.active {
            if current != index {
                self.lines[current].set_low()?;
            }
        }
        self.lines[index].set_high()?;
        self.active = Some(index);
        Ok(())
    }

    /// Drive every anode low
    pub fn deactivate_all(&mut self) -> Result<(), HalError> {
        for line in self.lines.iter_mut() {
            line.set_low()?;
        }
        self.active = None;
        Ok(())
    }

    /// Release every anode line
    pub fn release(&mut self) -> Result<(), HalError> {
        for line in self.lines.iter_mut() {
            line.release()?;
        }
        self.active = None;
        Ok(())
    }

    /// Index of the anode currently on
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn line(&self, index: usize) -> Option<&L> {
        self.lines.get(index)
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

/// Generic implementation for embedded-hal compatible output pins.
///
/// embedded-hal output pins cannot be tri-stated, so `release` drives the
/// line to its idle level instead.
pub struct EmbeddedHalLine<P> {
    pin: P,
    idle_high: bool,
}

impl<P> EmbeddedHalLine<P>
where
    P: OutputPin,
{
    /// Line that idles low (anodes, debug pin)
    pub fn new(pin: P) -> Self {
        Self { pin, idle_high: false }
    }

    /// Line that idles high (pump sink)
    pub fn idle_high(pin: P) -> Self {
        Self { pin, idle_high: true }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> DigitalLine for EmbeddedHalLine<P>
where
    P: OutputPin,
{
    fn configure_as_output(&mut self) -> Result<(), HalError> {
        // Typed pins are already outputs; park at the idle level
        self.release()
    }

    fn set_high(&mut self) -> Result<(), HalError> {
        self.pin.set_high().map_err(|_| HalError::GpioError)
    }

    fn set_low(&mut self) -> Result<(), HalError> {
        self.pin.set_low().map_err(|_| HalError::GpioError)
    }

    fn release(&mut self) -> Result<(), HalError> {
        if self.idle_high {
            self.set_high()
        } else {
            self.set_low()
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Recording mock hardware for testing

    use super::*;
    use crate::types::{CounterId, OFF};
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Identifies a mock digital line in the operation log
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum LineId {
        Anode(usize),
        PumpSink,
        Debug,
    }

    /// One hardware write, in the order the driver issued it
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum HwOp {
        LineConfigured(LineId),
        LineHigh(LineId),
        LineLow(LineId),
        LineReleased(LineId),
        CounterConfigured(CounterId),
        Compare {
            counter: CounterId,
            channel: CompareChannel,
            value: u8,
        },
        CounterReset(CounterId),
        ForceCompare(CounterId),
        OutputsConnected(CounterId),
        OutputsDisconnected(CounterId),
        CounterStarted(CounterId),
        CounterStopped(CounterId),
        OverflowInterrupt(CounterId, bool),
    }

    /// Operation log shared by every mock of one [`MockPixelHal`]
    pub type OpLog = Rc<RefCell<Vec<HwOp>>>;

    pub struct MockLine {
        id: LineId,
        high: bool,
        output: bool,
        failing: bool,
        log: OpLog,
    }

    impl MockLine {
        pub fn new(id: LineId, log: OpLog) -> Self {
            Self {
                id,
                high: false,
                output: false,
                failing: false,
                log,
            }
        }

        pub fn id(&self) -> LineId {
            self.id
        }

        /// Driven high as an output
        pub fn is_high(&self) -> bool {
            self.output && self.high
        }

        pub fn is_output(&self) -> bool {
            self.output
        }

        /// Make every following write fail with `GpioError`
        pub fn set_failing(&mut self, failing: bool) {
            self.failing = failing;
        }

        fn record(&self, op: HwOp) -> Result<(), HalError> {
            if self.failing {
                return Err(HalError::GpioError);
            }
            self.log.borrow_mut().push(op);
            Ok(())
        }
    }

    impl DigitalLine for MockLine {
        fn configure_as_output(&mut self) -> Result<(), HalError> {
            self.record(HwOp::LineConfigured(self.id))?;
            self.output = true;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), HalError> {
            self.record(HwOp::LineHigh(self.id))?;
            self.high = true;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), HalError> {
            self.record(HwOp::LineLow(self.id))?;
            self.high = false;
            Ok(())
        }

        fn release(&mut self) -> Result<(), HalError> {
            self.record(HwOp::LineReleased(self.id))?;
            self.output = false;
            self.high = false;
            Ok(())
        }
    }

    /// Counter model with buffered and active compare registers
    pub struct MockCounter {
        id: CounterId,
        buffered: [u8; 2],
        active: [u8; 2],
        configured: bool,
        running: bool,
        outputs_connected: bool,
        overflow_interrupt: bool,
        overflow_pending: bool,
        failing: bool,
        prescaler: Option<Prescaler>,
        log: OpLog,
    }

    impl MockCounter {
        pub fn new(id: CounterId, log: OpLog) -> Self {
            Self {
                id,
                buffered: [OFF; 2],
                active: [OFF; 2],
                configured: false,
                running: false,
                outputs_connected: false,
                overflow_interrupt: false,
                overflow_pending: false,
                failing: false,
                prescaler: None,
                log,
            }
        }

        /// Counter wrapped: buffered compares become active
        pub fn wrap(&mut self) {
            if self.running {
                self.active = self.buffered;
            }
        }

        /// Compare value driving the output this period
        pub fn active_compare(&self, channel: CompareChannel) -> u8 {
            self.active[channel.index()]
        }

        /// Compare value that will be loaded at the next wrap
        pub fn buffered_compare(&self, channel: CompareChannel) -> u8 {
            self.buffered[channel.index()]
        }

        /// Returns true if the channel pulls its cathode low at some point this period
        pub fn is_lit(&self, channel: CompareChannel) -> bool {
            self.running && self.outputs_connected && self.active_compare(channel) != OFF
        }

        pub fn is_configured(&self) -> bool {
            self.configured
        }

        pub fn is_running(&self) -> bool {
            self.running
        }

        pub fn outputs_connected(&self) -> bool {
            self.outputs_connected
        }

        pub fn overflow_interrupt_enabled(&self) -> bool {
            self.overflow_interrupt
        }

        pub fn prescaler(&self) -> Option<Prescaler> {
            self.prescaler
        }

        /// Make every following compare write fail
        pub fn set_failing(&mut self, failing: bool) {
            self.failing = failing;
        }

        /// Simulate an overflow that arrives while the interrupt body is still running
        pub fn set_overflow_pending(&mut self, pending: bool) {
            self.overflow_pending = pending;
        }

        fn record(&self, op: HwOp) {
            self.log.borrow_mut().push(op);
        }
    }

    impl PwmCounter for MockCounter {
        fn configure(&mut self) -> Result<(), HalError> {
            self.record(HwOp::CounterConfigured(self.id));
            self.configured = true;
            self.running = false;
            Ok(())
        }

        fn write_compare(&mut self, channel: CompareChannel, value: u8) -> Result<(), HalError> {
            if !self.configured {
                return Err(HalError::NotInitialized);
            }
            if self.failing {
                return Err(HalError::TimerError);
            }
            self.record(HwOp::Compare {
                counter: self.id,
                channel,
                value,
            });
            self.buffered[channel.index()] = value;
            Ok(())
        }

        fn reset_counter(&mut self) -> Result<(), HalError> {
            self.record(HwOp::CounterReset(self.id));
            self.active = self.buffered;
            Ok(())
        }

        fn force_compare(&mut self) -> Result<(), HalError> {
            self.record(HwOp::ForceCompare(self.id));
            Ok(())
        }

        fn connect_outputs(&mut self) -> Result<(), HalError> {
            self.record(HwOp::OutputsConnected(self.id));
            self.outputs_connected = true;
            Ok(())
        }

        fn disconnect_outputs(&mut self) -> Result<(), HalError> {
            self.record(HwOp::OutputsDisconnected(self.id));
            self.outputs_connected = false;
            Ok(())
        }

        fn start(&mut self, prescaler: Prescaler) -> Result<(), HalError> {
            if !self.configured {
                return Err(HalError::NotInitialized);
            }
            self.record(HwOp::CounterStarted(self.id));
            self.prescaler = Some(prescaler);
            self.running = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), HalError> {
            self.record(HwOp::CounterStopped(self.id));
            self.running = false;
            Ok(())
        }

        fn set_overflow_interrupt(&mut self, enabled: bool) -> Result<(), HalError> {
            self.record(HwOp::OverflowInterrupt(self.id, enabled));
            self.overflow_interrupt = enabled;
            Ok(())
        }

        fn overflow_pending(&self) -> bool {
            self.overflow_pending
        }
    }

    /// Mock tile: six anodes, a pump sink, a debug line and two counters
    pub struct MockPixelHal {
        anodes: AnodeBank<MockLine, PIXEL_COUNT>,
        pump_sink: MockLine,
        debug: Option<MockLine>,
        rg: MockCounter,
        blue: MockCounter,
        initialized: bool,
        log: OpLog,
    }

    impl MockPixelHal {
        pub fn new() -> Self {
            let log: OpLog = Rc::new(RefCell::new(Vec::new()));
            let anodes = core::array::from_fn(|i| MockLine::new(LineId::Anode(i), log.clone()));
            Self {
                anodes: AnodeBank::new(anodes),
                pump_sink: MockLine::new(LineId::PumpSink, log.clone()),
                debug: Some(MockLine::new(LineId::Debug, log.clone())),
                rg: MockCounter::new(CounterId::RedGreen, log.clone()),
                blue: MockCounter::new(CounterId::Blue, log.clone()),
                initialized: false,
                log,
            }
        }

        /// Board variant without an overrun debug pin
        pub fn without_debug_line() -> Self {
            Self {
                debug: None,
                ..Self::new()
            }
        }

        pub fn is_initialized(&self) -> bool {
            self.initialized
        }

        /// Copy of every recorded operation
        pub fn ops(&self) -> Vec<HwOp> {
            self.log.borrow().clone()
        }

        /// Drain the operation log
        pub fn take_ops(&self) -> Vec<HwOp> {
            core::mem::take(&mut *self.log.borrow_mut())
        }

        pub fn rg(&self) -> &MockCounter {
            &self.rg
        }

        pub fn blue(&self) -> &MockCounter {
            &self.blue
        }

        pub fn rg_mut(&mut self) -> &mut MockCounter {
            &mut self.rg
        }

        pub fn blue_mut(&mut self) -> &mut MockCounter {
            &mut self.blue
        }

        pub fn anode_bank(&self) -> &AnodeBank<MockLine, PIXEL_COUNT> {
            &self.anodes
        }

        pub fn anode_bank_mut(&mut self) -> &mut AnodeBank<MockLine, PIXEL_COUNT> {
            &mut self.anodes
        }

        pub fn pump(&self) -> &MockLine {
            &self.pump_sink
        }

        /// Both counters wrap at the end of a period
        pub fn wrap(&mut self) {
            self.rg.wrap();
            self.blue.wrap();
        }

        /// Indices of anodes currently driven high
        pub fn anodes_high(&self) -> Vec<usize> {
            (0..PIXEL_COUNT)
                .filter(|&i| self.anodes.line(i).map_or(false, |line| line.is_high()))
                .collect()
        }

        /// Pump sink driven low
        pub fn pump_charging(&self) -> bool {
            self.pump_sink.is_output() && !self.pump_sink.high
        }
    }

    impl Default for MockPixelHal {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PixelHal for MockPixelHal {
        type Anode = MockLine;
        type PumpSink = MockLine;
        type DebugLine = MockLine;
        type RgCounter = MockCounter;
        type BlueCounter = MockCounter;

        fn initialize(&mut self) -> Result<(), HalError> {
            self.initialized = true;
            Ok(())
        }

        fn anodes(&mut self) -> &mut AnodeBank<MockLine, PIXEL_COUNT> {
            &mut self.anodes
        }

        fn pump_sink(&mut self) -> &mut MockLine {
            &mut self.pump_sink
        }

        fn rg_counter(&mut self) -> &mut MockCounter {
            &mut self.rg
        }

        fn blue_counter(&mut self) -> &mut MockCounter {
            &mut self.blue
        }

        fn debug_line(&mut self) -> Option<&mut MockLine> {
            self.debug.as_mut()
        }
    }
}
