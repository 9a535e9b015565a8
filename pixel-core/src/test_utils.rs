//! Test utilities for the pixel refresh engine

#[cfg(feature = "test-utils")]
pub mod tick_source {
    //! Simulated counter overflows driving a mock-backed driver

    use crate::driver::PixelDriver;
    use crate::hal::mock::MockPixelHal;
    use crate::hal::{Duration, HalError, Instant};
    use crate::types::{RefreshConfig, PHASE_COUNT, PIXEL_COUNT};

    use super::period_capture::{PeriodCapture, PeriodRecord};

    /// Overflow interrupts per full refresh
    pub const TICKS_PER_FRAME: usize = PHASE_COUNT * PIXEL_COUNT;

    /// Stands in for the red/green counter: each step is one wrap plus one interrupt
    pub struct SimulatedClock {
        now: Instant,
        period: Duration,
        periods: u64,
    }

    impl SimulatedClock {
        pub fn new(config: &RefreshConfig) -> Self {
            Self {
                now: Instant::from_micros(0),
                period: config.phase_duration(),
                periods: 0,
            }
        }

        /// Simulated time of the next overflow
        pub fn now(&self) -> Instant {
            self.now
        }

        pub fn periods(&self) -> u64 {
            self.periods
        }

        /// One overflow: both counters wrap and latch their buffered compares,
        /// the interrupt body runs, then the period that follows is captured.
        /// An injected pending overflow is consumed by this step.
        pub fn step(&mut self, driver: &mut PixelDriver<'_, MockPixelHal>) -> Result<PeriodRecord, HalError> {
            driver.hal_mut().wrap();
            let tick = driver.on_overflow();
            driver.hal_mut().rg_mut().set_overflow_pending(false);
            let record = PeriodRecord::capture(self.periods, self.now, tick?, driver.hal());
            self.now = self.now + self.period;
            self.periods += 1;
            Ok(record)
        }

        /// Run `periods` overflows
        pub fn run(
            &mut self,
            driver: &mut PixelDriver<'_, MockPixelHal>,
            periods: usize,
        ) -> Result<PeriodCapture, HalError> {
            let mut capture = PeriodCapture::new();
            for _ in 0..periods {
                capture.push(self.step(driver)?);
            }
            Ok(capture)
        }

        /// Run whole refreshes
        pub fn run_frames(
            &mut self,
            driver: &mut PixelDriver<'_, MockPixelHal>,
            frames: usize,
        ) -> Result<PeriodCapture, HalError> {
            self.run(driver, frames * TICKS_PER_FRAME)
        }
    }
}

#[cfg(feature = "test-utils")]
pub mod period_capture {
    //! Per-period record of what the LEDs actually showed

    use crate::hal::mock::{MockCounter, MockPixelHal};
    use crate::hal::Instant;
    use crate::sequencer::TickOutcome;
    use crate::types::{ColorChannel, CounterId, PIXEL_COUNT};
    use heapless::Vec;

    use super::electrical::Violation;

    /// Hardware state for one PWM period, right after its interrupt ran
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct PeriodRecord {
        pub index: u64,
        pub started: Instant,
        /// Sequencer step taken at the start of the period, `None` if disabled
        pub tick: Option<TickOutcome>,
        /// Anodes driven high
        pub anodes: Vec<usize, PIXEL_COUNT>,
        /// Channels whose cathode is pulled low during the period
        pub lit: Vec<ColorChannel, 3>,
        pub pump_charging: bool,
    }

    fn counter(hal: &MockPixelHal, channel: ColorChannel) -> &MockCounter {
        match channel.counter() {
            CounterId::RedGreen => hal.rg(),
            CounterId::Blue => hal.blue(),
        }
    }

    impl PeriodRecord {
        pub fn capture(index: u64, started: Instant, tick: Option<TickOutcome>, hal: &MockPixelHal) -> Self {
            let mut anodes = Vec::new();
            for anode in hal.anodes_high() {
                let _ = anodes.push(anode);
            }
            let mut lit = Vec::new();
            for channel in ColorChannel::ALL {
                if counter(hal, channel).is_lit(channel.compare_channel()) {
                    let _ = lit.push(channel);
                }
            }
            Self {
                index,
                started,
                tick,
                anodes,
                lit,
                pump_charging: hal.pump_charging(),
            }
        }

        /// Pixel that can light this period, if exactly one anode is on
        pub fn active_pixel(&self) -> Option<usize> {
            match self.anodes.as_slice() {
                [pixel] => Some(*pixel),
                _ => None,
            }
        }

        /// A channel visibly lit: cathode pulled low under an active anode
        pub fn shows(&self, channel: ColorChannel) -> bool {
            self.active_pixel().is_some() && self.lit.contains(&channel)
        }
    }

    /// Sequence of captured periods
    #[derive(Clone, Debug, Default)]
    pub struct PeriodCapture {
        records: std::vec::Vec<PeriodRecord>,
    }

    impl PeriodCapture {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&mut self, record: PeriodRecord) {
            self.records.push(record);
        }

        pub fn records(&self) -> &[PeriodRecord] {
            &self.records
        }

        /// (pixel, phase) of every interrupt, in order
        pub fn visits(&self) -> std::vec::Vec<(usize, crate::types::Phase)> {
            self.records
                .iter()
                .filter_map(|record| record.tick.map(|tick| (tick.pixel, tick.phase)))
                .collect()
        }

        /// Completed refreshes seen during the capture
        pub fn frames_completed(&self) -> usize {
            self.records
                .iter()
                .filter(|record| record.tick.map_or(false, |tick| tick.frame_complete))
                .count()
        }

        /// Every (pixel, channel) that lit, with the period it lit in
        pub fn windows(&self) -> std::vec::Vec<(u64, usize, ColorChannel)> {
            let mut windows = std::vec::Vec::new();
            for record in &self.records {
                if let Some(pixel) = record.active_pixel() {
                    for channel in record.lit.iter() {
                        windows.push((record.index, pixel, *channel));
                    }
                }
            }
            windows
        }

        /// Lit channels of one pixel, in display order
        pub fn shown_by(&self, pixel: usize) -> std::vec::Vec<ColorChannel> {
            self.windows()
                .into_iter()
                .filter(|(_, shown, _)| *shown == pixel)
                .map(|(_, _, channel)| channel)
                .collect()
        }

        /// Period-level safety: one anode at most, no charging under an
        /// anode, at most one color lit per period
        pub fn check(&self) -> Result<(), Violation> {
            for (at, record) in self.records.iter().enumerate() {
                if record.anodes.len() > 1 {
                    return Err(Violation::MultipleAnodes { at });
                }
                if record.pump_charging && !record.anodes.is_empty() {
                    return Err(Violation::ChargingWithAnode { at });
                }
                if record.lit.len() > 1 {
                    return Err(Violation::MultipleColors { at });
                }
            }
            Ok(())
        }
    }
}

#[cfg(feature = "test-utils")]
pub mod electrical {
    //! Replay of recorded hardware writes, checked after every single write

    use crate::hal::mock::{HwOp, LineId};
    use crate::types::PIXEL_COUNT;

    /// First write (or period) that broke an electrical rule
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum Violation {
        MultipleAnodes { at: usize },
        ChargingWithAnode { at: usize },
        MultipleColors { at: usize },
    }

    /// Line levels reconstructed from a write log
    #[derive(Clone, Debug, Default)]
    pub struct LineModel {
        anodes: [bool; PIXEL_COUNT],
        sink_output: bool,
        sink_high: bool,
    }

    impl LineModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn apply(&mut self, op: &HwOp) {
            match *op {
                HwOp::LineHigh(LineId::Anode(i)) => self.set_anode(i, true),
                HwOp::LineLow(LineId::Anode(i)) | HwOp::LineReleased(LineId::Anode(i)) => self.set_anode(i, false),
                HwOp::LineConfigured(LineId::PumpSink) => self.sink_output = true,
                HwOp::LineReleased(LineId::PumpSink) => self.sink_output = false,
                HwOp::LineHigh(LineId::PumpSink) => self.sink_high = true,
                HwOp::LineLow(LineId::PumpSink) => self.sink_high = false,
                _ => {}
            }
        }

        fn set_anode(&mut self, index: usize, high: bool) {
            if let Some(anode) = self.anodes.get_mut(index) {
                *anode = high;
            }
        }

        pub fn active_anodes(&self) -> usize {
            self.anodes.iter().filter(|high| **high).count()
        }

        pub fn charging(&self) -> bool {
            self.sink_output && !self.sink_high
        }
    }

    /// Replay `ops` and stop at the first write that left two anodes on or
    /// the pump charging under an anode
    pub fn check_electrical_safety(ops: &[HwOp]) -> Result<(), Violation> {
        let mut model = LineModel::new();
        for (at, op) in ops.iter().enumerate() {
            model.apply(op);
            let active = model.active_anodes();
            if active > 1 {
                return Err(Violation::MultipleAnodes { at });
            }
            if active == 1 && model.charging() {
                return Err(Violation::ChargingWithAnode { at });
            }
        }
        Ok(())
    }
}

#[cfg(feature = "test-utils")]
pub mod test_scenarios {
    //! Common color scenes

    use crate::types::{Rgb, PIXEL_COUNT};
    use heapless::Vec;

    /// One primary or secondary per pixel
    pub fn rainbow() -> [Rgb; PIXEL_COUNT] {
        [Rgb::RED, Rgb::YELLOW, Rgb::GREEN, Rgb::CYAN, Rgb::BLUE, Rgb::MAGENTA]
    }

    /// Single lit pixel, the rest off
    pub fn single(pixel: usize, color: Rgb) -> [Rgb; PIXEL_COUNT] {
        let mut scene = [Rgb::BLACK; PIXEL_COUNT];
        if let Some(slot) = scene.get_mut(pixel) {
            *slot = color;
        }
        scene
    }

    /// Scenes worth running every safety check against
    pub fn safety_scenes() -> Vec<[Rgb; PIXEL_COUNT], 6> {
        let mut scenes = Vec::new();
        let _ = scenes.push([Rgb::BLACK; PIXEL_COUNT]);
        let _ = scenes.push([Rgb::WHITE; PIXEL_COUNT]);
        let _ = scenes.push([Rgb::BLUE; PIXEL_COUNT]);
        let _ = scenes.push(rainbow());
        let _ = scenes.push(single(0, Rgb::WHITE));
        let _ = scenes.push(single(PIXEL_COUNT - 1, Rgb::new(1, 128, 255)));
        scenes
    }
}
