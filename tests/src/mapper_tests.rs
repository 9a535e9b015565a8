// Color mapping tests through the public color path

use pixel_core::{map_channel, map_rgb, ColorChannel, PixelStore, RawColor, Rgb, OFF, PIXEL_COUNT};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case(ColorChannel::Red, 255, 170)]
#[case(ColorChannel::Green, 255, 128)]
#[case(ColorChannel::Blue, 255, 128)]
#[case(ColorChannel::Red, 128, 243)]
#[case(ColorChannel::Green, 128, 237)]
#[case(ColorChannel::Blue, 128, 237)]
#[case(ColorChannel::Red, 0, OFF)]
#[case(ColorChannel::Blue, 0, OFF)]
fn test_channel_mapping(#[case] channel: ColorChannel, #[case] intensity: u8, #[case] expected: u8) {
    assert_eq!(map_channel(channel, intensity), expected);
}

#[test]
fn test_set_all_black_is_off() {
    let store = PixelStore::new();
    store.set_all(12, 200, 7);

    store.set_all(0, 0, 0);

    for pixel in 0..PIXEL_COUNT {
        assert_eq!(store.raw(pixel), Some(RawColor::OFF));
    }
}

#[test]
fn test_red_then_black_is_off() {
    let store = PixelStore::new();
    store.set_color(0, 255, 0, 0);
    assert_eq!(store.raw(0), Some(RawColor::new(170, OFF, OFF)));

    store.set_color(0, 0, 0, 0);
    assert_eq!(store.raw(0), Some(RawColor::OFF));
}

#[test]
fn test_out_of_range_pixel_is_ignored() {
    let store = PixelStore::new();
    store.set_all(1, 2, 3);
    let before = store.snapshot();

    store.set_color(PIXEL_COUNT, 255, 255, 255);
    store.set_color(usize::MAX, 255, 255, 255);

    assert_eq!(store.snapshot(), before);
    assert_eq!(store.raw(PIXEL_COUNT), None);
}

#[test]
fn test_red_is_dimmer_than_green_and_blue() {
    for intensity in 1..=255u8 {
        let red = map_channel(ColorChannel::Red, intensity);
        assert!(red >= map_channel(ColorChannel::Green, intensity));
        assert!(red >= map_channel(ColorChannel::Blue, intensity));
    }
}

proptest! {
    #[test]
    fn prop_mapping_is_monotonic(a in any::<u8>(), b in any::<u8>()) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        for channel in ColorChannel::ALL {
            // Inverted: brighter means a smaller compare value
            prop_assert!(map_channel(channel, low) >= map_channel(channel, high));
        }
    }

    #[test]
    fn prop_stored_color_ignores_history(
        pixel in 0..PIXEL_COUNT,
        prior in any::<(u8, u8, u8)>(),
        color in any::<(u8, u8, u8)>(),
    ) {
        let store = PixelStore::new();
        store.set_color(pixel, prior.0, prior.1, prior.2);
        store.set_color(pixel, color.0, color.1, color.2);

        let expected = map_rgb(Rgb::new(color.0, color.1, color.2));
        prop_assert_eq!(store.raw(pixel), Some(expected));
    }

    #[test]
    fn prop_write_touches_one_pixel(pixel in 0..PIXEL_COUNT, color in any::<(u8, u8, u8)>()) {
        let store = PixelStore::new();
        store.set_color(pixel, color.0, color.1, color.2);

        for other in (0..PIXEL_COUNT).filter(|other| *other != pixel) {
            prop_assert_eq!(store.raw(other), Some(RawColor::OFF));
        }
    }

    #[test]
    fn prop_raw_packing_is_lossless(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
        let raw = RawColor::new(r, g, b);
        prop_assert_eq!(RawColor::unpack(raw.pack()), raw);
    }
}
