//! Embassy time driver clocked by the pixel refresh interrupt
//!
//! There is no free-running system timer: time advances by one phase on every
//! TIM3 overflow and stands still while the display is disabled.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver};
use portable_atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Refresh-clocked time driver with a single alarm
pub struct RefreshTimeDriver {
    ticks: AtomicU64,
    ticks_per_phase: AtomicU32,
    alarm_taken: AtomicBool,
    alarm: Mutex<Cell<AlarmState>>,
}

#[derive(Copy, Clone)]
struct AlarmState {
    timestamp: u64,
    callback: Option<fn(*mut ())>,
    ctx: usize,
}

impl AlarmState {
    const fn new() -> Self {
        Self {
            timestamp: u64::MAX,
            callback: None,
            ctx: 0,
        }
    }
}

impl RefreshTimeDriver {
    const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            ticks_per_phase: AtomicU32::new(0),
            alarm_taken: AtomicBool::new(false),
            alarm: Mutex::new(Cell::new(AlarmState::new())),
        }
    }

    /// Advance by one phase and fire the alarm if it is due (called from the refresh interrupt)
    fn tick(&self) {
        let step = self.ticks_per_phase.load(Ordering::Relaxed) as u64;
        let now = self.ticks.fetch_add(step, Ordering::Relaxed) + step;

        let due = critical_section::with(|cs| {
            let cell = self.alarm.borrow(cs);
            let mut alarm = cell.get();
            if alarm.timestamp > now {
                return None;
            }
            alarm.timestamp = u64::MAX;
            cell.set(alarm);
            alarm.callback.map(|callback| (callback, alarm.ctx))
        });

        if let Some((callback, ctx)) = due {
            callback(ctx as *mut ());
        }
    }
}

impl Driver for RefreshTimeDriver {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        if self.alarm_taken.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(AlarmHandle::new(0))
        }
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, callback: fn(*mut ()), ctx: *mut ()) {
        critical_section::with(|cs| {
            let cell = self.alarm.borrow(cs);
            let mut alarm = cell.get();
            alarm.callback = Some(callback);
            alarm.ctx = ctx as usize;
            cell.set(alarm);
        });
    }

    fn set_alarm(&self, _alarm: AlarmHandle, timestamp: u64) -> bool {
        critical_section::with(|cs| {
            if timestamp <= self.now() {
                return false;
            }
            let cell = self.alarm.borrow(cs);
            let mut alarm = cell.get();
            alarm.timestamp = timestamp;
            cell.set(alarm);
            true
        })
    }
}

// Export the driver
embassy_time_driver::time_driver_impl!(static DRIVER: RefreshTimeDriver = RefreshTimeDriver::new());

/// Set how far one refresh interrupt moves the clock (1 MHz ticks)
pub fn set_phase_micros(micros: u32) {
    DRIVER.ticks_per_phase.store(micros, Ordering::Relaxed);
}

/// Called once per refresh interrupt
pub fn on_refresh_tick() {
    DRIVER.tick();
}

// Critical section implementation for single-core RISC-V
critical_section::set_impl!(RiscvCriticalSection);

struct RiscvCriticalSection;

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        let mstatus = riscv::register::mstatus::read();
        riscv::register::mstatus::clear_mie();
        mstatus.mie() as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            riscv::register::mstatus::set_mie();
        }
    }
}
