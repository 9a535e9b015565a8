// Refresh sequencing tests: order, timing windows and electrical rules

use pixel_core::hal::mock::{HwOp, LineId};
use pixel_core::{map_rgb, ColorChannel, FrameNotifier, Phase, PixelStore, Rgb, PHASE_COUNT, PIXEL_COUNT};
use rstest::rstest;

use crate::test_scenarios::{rainbow, safety_scenes, single};
use crate::*;

#[test]
fn test_round_robin_over_six_frames() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 6).unwrap();

    let expected: Vec<(usize, Phase)> = (0..6)
        .flat_map(|_| (0..PIXEL_COUNT).flat_map(|pixel| Phase::ALL.into_iter().map(move |phase| (pixel, phase))))
        .collect();
    assert_eq!(capture.visits(), expected);
    assert_eq!(capture.frames_completed(), 6);
    assert_eq!(driver.frames(), 6);
}

#[test]
fn test_frame_complete_only_on_last_phase_of_last_pixel() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 2).unwrap();

    for record in capture.records() {
        let tick = record.tick.unwrap();
        let last = tick.pixel == PIXEL_COUNT - 1 && tick.phase == Phase::Green;
        assert_eq!(tick.frame_complete, last, "period {}", record.index);
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(4)]
#[case(5)]
fn test_electrical_rules_hold_for_scene(#[case] scene: usize) {
    let scenes = safety_scenes();
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    apply_scene(&store, &scenes[scene]);
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 3).unwrap();

    assert_eq!(capture.check(), Ok(()));
    assert_eq!(check_electrical_safety(&driver.hal().ops()), Ok(()));
}

#[test]
fn test_white_shows_each_color_once_under_own_anode() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    store.set_all(255, 255, 255);
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 1).unwrap();

    for pixel in 0..PIXEL_COUNT {
        assert_eq!(
            capture.shown_by(pixel),
            vec![ColorChannel::Blue, ColorChannel::Red, ColorChannel::Green],
            "pixel {pixel}"
        );
    }

    // Blue, red, green windows sit at phases 2, 3 and 4 of each pixel
    for (index, pixel, channel) in capture.windows() {
        let offset = index as usize - pixel * PHASE_COUNT;
        let expected = match channel {
            ColorChannel::Blue => 2,
            ColorChannel::Red => 3,
            ColorChannel::Green => 4,
        };
        assert_eq!(offset, expected, "pixel {pixel} {channel:?}");
    }
}

#[test]
fn test_single_pixel_does_not_bleed() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    apply_scene(&store, &single(2, Rgb::WHITE));
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 2).unwrap();

    assert_eq!(lit_pixels(&capture).as_slice(), &[2]);
    assert_eq!(capture.shown_by(2).len(), 6);
}

#[test]
fn test_rainbow_channels_match_colors() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let scene = rainbow();
    apply_scene(&store, &scene);
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 1).unwrap();

    for (pixel, color) in scene.iter().enumerate() {
        let expected: Vec<ColorChannel> = [ColorChannel::Blue, ColorChannel::Red, ColorChannel::Green]
            .into_iter()
            .filter(|channel| color.channel(*channel) > 0)
            .collect();
        assert_eq!(capture.shown_by(pixel), expected, "pixel {pixel}");
    }
}

#[test]
fn test_compare_values_follow_mapping() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let color = Rgb::new(200, 90, 30);
    store.set_rgb(0, color);
    let raw = map_rgb(color);
    let mut clock = SimulatedClock::new(driver.config());

    // Charge, Rest, then the blue window
    clock.run(&mut driver, 2).unwrap();
    clock.step(&mut driver).unwrap();
    assert_eq!(driver.hal().blue().active_compare(ColorChannel::Blue.compare_channel()), raw.b);
    clock.step(&mut driver).unwrap();
    assert_eq!(driver.hal().rg().active_compare(ColorChannel::Red.compare_channel()), raw.r);
    clock.step(&mut driver).unwrap();
    assert_eq!(driver.hal().rg().active_compare(ColorChannel::Green.compare_channel()), raw.g);
}

#[test]
fn test_mid_frame_write_shows_from_next_frame() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let mut clock = SimulatedClock::new(driver.config());

    let mut first = clock.run(&mut driver, 10).unwrap();
    store.set_color(4, 0, 255, 0);
    for _ in 10..TICKS_PER_FRAME {
        first.push(clock.step(&mut driver).unwrap());
    }
    assert!(first.shown_by(4).is_empty());

    let second = clock.run_frames(&mut driver, 1).unwrap();
    assert_eq!(second.shown_by(4), vec![ColorChannel::Green]);
}

#[test]
fn test_frame_uses_one_consistent_snapshot() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    store.set_all(255, 0, 0);
    let mut clock = SimulatedClock::new(driver.config());

    let mut capture = clock.run(&mut driver, 3).unwrap();
    // Rewrite every pixel while pixel 0 is on screen
    store.set_all(0, 0, 255);
    for _ in 3..TICKS_PER_FRAME {
        capture.push(clock.step(&mut driver).unwrap());
    }

    for pixel in 0..PIXEL_COUNT {
        assert_eq!(capture.shown_by(pixel), vec![ColorChannel::Red], "pixel {pixel}");
    }
}

#[test]
fn test_no_charge_without_blue() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    apply_scene(&store, &[Rgb::RED, Rgb::GREEN, Rgb::YELLOW, Rgb::RED, Rgb::GREEN, Rgb::YELLOW]);
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 2).unwrap();

    assert!(capture.records().iter().all(|record| !record.pump_charging));
}

#[test]
fn test_charge_precedes_blue_pixel_only() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    apply_scene(&store, &single(3, Rgb::BLUE));
    let mut clock = SimulatedClock::new(driver.config());

    let capture = clock.run_frames(&mut driver, 2).unwrap();

    let charging: Vec<u64> = capture
        .records()
        .iter()
        .filter(|record| record.pump_charging)
        .map(|record| record.index)
        .collect();
    let charge_period = (3 * PHASE_COUNT) as u64;
    assert_eq!(charging, vec![charge_period, charge_period + TICKS_PER_FRAME as u64]);

    for record in capture.records().iter().filter(|record| record.pump_charging) {
        assert!(record.anodes.is_empty());
        assert_eq!(record.tick.map(|tick| tick.phase), Some(Phase::Charge));
    }
}

#[test]
fn test_overrun_pulses_debug_line_once() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    store.set_all(255, 255, 255);
    let mut clock = SimulatedClock::new(driver.config());
    driver.hal().take_ops();

    let injected = [3usize, 17, 29, 40];
    for period in 0..2 * TICKS_PER_FRAME {
        if injected.contains(&period) {
            driver.hal_mut().rg_mut().set_overflow_pending(true);
        }
        clock.step(&mut driver).unwrap();
    }

    let debug_ops: Vec<HwOp> = driver
        .hal()
        .ops()
        .into_iter()
        .filter(|op| matches!(op, HwOp::LineHigh(LineId::Debug) | HwOp::LineLow(LineId::Debug)))
        .collect();
    let pulses = debug_ops.iter().filter(|op| **op == HwOp::LineHigh(LineId::Debug)).count();
    assert_eq!(pulses, injected.len());
    assert_eq!(debug_ops.last(), Some(&HwOp::LineLow(LineId::Debug)));
    assert_eq!(driver.overruns(), injected.len() as u32);
}

static ROUND_COUNTER: FrameNotifier = FrameNotifier::noop();

#[test]
fn test_frame_hook_runs_once_per_round() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap().with_frame_notifier(&ROUND_COUNTER);
    let mut clock = SimulatedClock::new(driver.config());

    clock.run(&mut driver, TICKS_PER_FRAME - 1).unwrap();
    assert_eq!(ROUND_COUNTER.runs(), 0);

    clock.step(&mut driver).unwrap();
    assert_eq!(ROUND_COUNTER.runs(), 1);

    clock.run_frames(&mut driver, 4).unwrap();
    assert_eq!(ROUND_COUNTER.runs(), 5);
    assert_eq!(ROUND_COUNTER.notifications(), 5);
}
