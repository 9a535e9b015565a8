#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// RISC-V runtime
use riscv_rt as _;

// Panic handler
use panic_halt as _;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

use pixel_firmware::clocks::TIMER_CLOCK_HZ;
use pixel_firmware::*;

/// Idle time before the display is put to sleep
const SLEEP_AFTER: Duration = Duration::from_secs(60);

/// Main firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    #[cfg(feature = "defmt")]
    defmt::info!("Tile pixel firmware starting...");

    let config = match RefreshConfig::new(TIMER_CLOCK_HZ, Prescaler::Div8, PIXEL_CYCLES_PER_FRAME) {
        Ok(config) => config,
        Err(_msg) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("Refresh config rejected ({}), using default", _msg);
            default_config()
        }
    };

    if display::init(config).is_err() {
        #[cfg(feature = "defmt")]
        defmt::error!("Pixel hardware init failed");
        return;
    }
    display::set_all_colors(0, 0, 0);
    display::enable().ok();

    #[cfg(feature = "defmt")]
    defmt::info!("Refresh running at {} Hz", config.refresh_hz());

    spawner.must_spawn(animation_task());

    // Main supervision loop
    loop {
        Timer::after(SLEEP_AFTER).await;
        sleep_until_wake();
    }
}

/// Park the display and wait for any interrupt (button EXTI on the board)
fn sleep_until_wake() {
    #[cfg(feature = "defmt")]
    defmt::info!("Display sleeping, {} overruns so far", display::overruns());

    display::disable().ok();
    // Wait for interrupt
    unsafe { riscv::asm::wfi() };
    display::enable().ok();
}

// ========================================
// Interrupt Handlers
// ========================================

/// TIM3 update interrupt: one refresh phase
#[no_mangle]
extern "C" fn TIM3_IRQHandler() {
    display::on_timer_overflow();
}
