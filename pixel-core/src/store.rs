//! Pixel color store shared between the foreground and the refresh interrupt

use portable_atomic::{AtomicU32, Ordering};

use crate::gamma;
use crate::types::{RawColor, Rgb, PIXEL_COUNT};

/// Compare values for every pixel.
///
/// Each pixel is one packed word, so the refresh interrupt never sees a
/// half-written color. Writes to pixels outside `0..PIXEL_COUNT` are ignored.
pub struct PixelStore {
    cells: [AtomicU32; PIXEL_COUNT],
}

impl PixelStore {
    /// Create a store with every pixel off
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const OFF_CELL: AtomicU32 = AtomicU32::new(RawColor::OFF.pack());
        Self {
            cells: [OFF_CELL; PIXEL_COUNT],
        }
    }

    /// Set one pixel from perceptual intensities (0 = off, 255 = full)
    pub fn set_color(&self, pixel: usize, r: u8, g: u8, b: u8) {
        self.set_rgb(pixel, Rgb::new(r, g, b));
    }

    pub fn set_rgb(&self, pixel: usize, color: Rgb) {
        self.set_raw(pixel, gamma::map_rgb(color));
    }

    /// Set every pixel to the same color
    pub fn set_all(&self, r: u8, g: u8, b: u8) {
        let raw = gamma::map_rgb(Rgb::new(r, g, b));
        for pixel in 0..PIXEL_COUNT {
            self.set_raw(pixel, raw);
        }
    }

    /// Store compare values directly, bypassing the mapper
    pub fn set_raw(&self, pixel: usize, raw: RawColor) {
        if let Some(cell) = self.cells.get(pixel) {
            cell.store(raw.pack(), Ordering::Relaxed);
        }
    }

    /// Compare values of one pixel
    pub fn raw(&self, pixel: usize) -> Option<RawColor> {
        self.cells
            .get(pixel)
            .map(|cell| RawColor::unpack(cell.load(Ordering::Relaxed)))
    }

    /// Turn every pixel off
    pub fn clear(&self) {
        for cell in self.cells.iter() {
            cell.store(RawColor::OFF.pack(), Ordering::Relaxed);
        }
    }

    /// Copy of the whole store
    pub fn snapshot(&self) -> [RawColor; PIXEL_COUNT] {
        core::array::from_fn(|pixel| RawColor::unpack(self.cells[pixel].load(Ordering::Relaxed)))
    }
}

impl Default for PixelStore {
    fn default() -> Self {
        Self::new()
    }
}
