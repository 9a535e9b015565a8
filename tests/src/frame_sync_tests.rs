// Frame completion timing and consumers waiting on it

use std::sync::OnceLock;

use embassy_time::{Instant, MockDriver as EmbassyClock};
use pixel_core::{FrameNotifier, PixelStore, RefreshConfig};
use tokio::sync::mpsc;
use tokio_test::{assert_pending, assert_ready_eq};

use crate::*;

#[test]
fn test_rounds_complete_on_frame_boundaries() {
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let config = *driver.config();
    let mut clock = SimulatedClock::new(&config);

    let capture = clock.run_frames(&mut driver, 4).unwrap();

    let ends: Vec<u64> = capture
        .records()
        .iter()
        .filter(|record| record.tick.map_or(false, |tick| tick.frame_complete))
        .map(|record| (record.started + config.phase_duration()).as_micros())
        .collect();
    let frame = config.frame_duration().as_micros();
    assert_eq!(ends, vec![frame, 2 * frame, 3 * frame, 4 * frame]);
}

#[test]
fn test_default_refresh_timing() {
    let config = RefreshConfig::default();

    assert_eq!(config.phase_duration().as_micros(), 512);
    assert_eq!(config.frame_duration().as_micros(), 15_360);
    assert_eq!(config.refresh_hz(), 65);
}

#[test]
fn test_embassy_clock_tracks_refresh_periods() {
    let embassy_clock = EmbassyClock::get();
    let start = Instant::now();
    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap();
    let config = *driver.config();
    let mut clock = SimulatedClock::new(&config);

    for _ in 0..2 * TICKS_PER_FRAME {
        clock.step(&mut driver).unwrap();
        embassy_clock.advance(config.phase_duration());
    }

    let elapsed = Instant::now() - start;
    assert_eq!(elapsed, config.frame_duration() * 2);
    assert_eq!(elapsed.as_micros(), clock.now().as_micros());
}

static CONSUMER_TX: OnceLock<mpsc::UnboundedSender<u32>> = OnceLock::new();
static CONSUMER_FRAMES: FrameNotifier = FrameNotifier::new(forward_to_consumer);

fn forward_to_consumer() {
    if let Some(tx) = CONSUMER_TX.get() {
        let _ = tx.send(CONSUMER_FRAMES.notifications());
    }
}

#[tokio::test(start_paused = true)]
async fn test_consumer_wakes_once_per_frame() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    CONSUMER_TX.set(tx).unwrap();

    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap().with_frame_notifier(&CONSUMER_FRAMES);
    let config = *driver.config();
    let mut clock = SimulatedClock::new(&config);
    let phase = std::time::Duration::from_micros(config.phase_duration().as_micros());

    let refresh = async {
        for _ in 0..3 * TICKS_PER_FRAME {
            tokio::time::sleep(phase).await;
            clock.step(&mut driver).unwrap();
        }
    };
    let consumer = async {
        let mut seen = Vec::new();
        while seen.len() < 3 {
            match tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await {
                Ok(Some(frame)) => seen.push(frame),
                _ => break,
            }
        }
        seen
    };

    let ((), seen) = tokio::join!(refresh, consumer);
    assert_eq!(seen, vec![1, 2, 3]);
}

static WAITER_TX: OnceLock<mpsc::UnboundedSender<u32>> = OnceLock::new();
static WAITER_FRAMES: FrameNotifier = FrameNotifier::new(forward_to_waiter);

fn forward_to_waiter() {
    if let Some(tx) = WAITER_TX.get() {
        let _ = tx.send(WAITER_FRAMES.notifications());
    }
}

#[test]
fn test_waiter_pending_until_round_completes() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    WAITER_TX.set(tx).unwrap();

    let store = PixelStore::new();
    let mut driver = running_driver(&store).unwrap().with_frame_notifier(&WAITER_FRAMES);
    let mut clock = SimulatedClock::new(driver.config());

    let mut wait = tokio_test::task::spawn(rx.recv());
    assert_pending!(wait.poll());

    clock.run(&mut driver, TICKS_PER_FRAME - 1).unwrap();
    assert!(!wait.is_woken());
    assert_pending!(wait.poll());

    clock.step(&mut driver).unwrap();
    assert!(wait.is_woken());
    assert_ready_eq!(wait.poll(), Some(1));
}
