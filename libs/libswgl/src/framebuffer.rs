//! Software framebuffer for the rasterizer.
//!
//! `SwFramebuffer` owns a packed 32-bit color buffer and a float depth buffer,
//! both row-major with the top row first. Pipeline coordinates have y growing
//! upward, so every write flips the row. A depth of exactly 0.0 means the
//! pixel has not been written since the last depth clear.

use alloc::vec;
use alloc::vec::Vec;
use crate::config::ColorFormat;
use crate::rasterizer::math::clamp01;

/// Software framebuffer with color and depth.
pub struct SwFramebuffer {
    /// `R<<24 | G<<16 | B<<8 | A` pixels (row-major, top-left origin).
    pub color: Vec<u32>,
    /// Depth buffer, 0.0 = unwritten.
    pub depth: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
}

impl SwFramebuffer {
    /// Allocate a new framebuffer. All pixels and depths are 0.
    pub fn new(width: u32, height: u32, format: ColorFormat) -> Self {
        let size = (width as usize) * (height as usize);
        Self { color: vec![0u32; size], depth: vec![0.0f32; size], width, height, format }
    }

    /// Clamp and pack an RGBA color for this buffer's format.
    pub fn pack(&self, rgba: [f32; 4]) -> u32 {
        let channel = |c: f32| (clamp01(c) * 255.0) as u32;
        let a = match self.format {
            ColorFormat::Rgb => 0xFF,
            ColorFormat::Rgba => channel(rgba[3]),
        };
        channel(rgba[0]) << 24 | channel(rgba[1]) << 16 | channel(rgba[2]) << 8 | a
    }

    /// Buffer index of pipeline pixel `(x, y)`, or `None` if off-screen.
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let row = self.height as usize - 1 - y as usize;
        Some(row * self.width as usize + x as usize)
    }

    /// Fill the color of every pixel in `[x0, x1) × [y0, y1)`, clipped to the buffer.
    pub fn clear_color(&mut self, rect: [i32; 4], packed: u32) {
        self.for_rows(rect, |fb, start, len| fb.color[start..start + len].fill(packed));
    }

    /// Reset depth in `[x0, x1) × [y0, y1)` to 0 (unwritten).
    pub fn clear_depth(&mut self, rect: [i32; 4]) {
        self.for_rows(rect, |fb, start, len| fb.depth[start..start + len].fill(0.0));
    }

    fn for_rows(&mut self, [x0, y0, x1, y1]: [i32; 4], mut f: impl FnMut(&mut Self, usize, usize)) {
        let x0 = x0.max(0);
        let y0 = y0.max(0);
        let x1 = x1.min(self.width as i32);
        let y1 = y1.min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        for y in y0..y1 {
            if let Some(start) = self.index(x0, y) {
                f(self, start, (x1 - x0) as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn packs_and_clamps() {
        let fb = SwFramebuffer::new(1, 1, ColorFormat::Rgba);
        assert_eq!(fb.pack([1.0, 0.5, -1.0, 2.0]), 0xFF7F00FF);
        let rgb = SwFramebuffer::new(1, 1, ColorFormat::Rgb);
        assert_eq!(rgb.pack([0.0, 0.0, 1.0, 0.0]), 0x0000FFFF);
    }

    #[test]
    fn rows_are_flipped() {
        let fb = SwFramebuffer::new(4, 3, ColorFormat::Rgba);
        assert_eq!(fb.index(0, 0), Some(8));
        assert_eq!(fb.index(3, 2), Some(3));
        assert_eq!(fb.index(4, 0), None);
        assert_eq!(fb.index(0, -1), None);
    }

    #[test]
    fn clear_is_limited_to_rect() {
        let mut fb = SwFramebuffer::new(4, 4, ColorFormat::Rgba);
        fb.depth.fill(0.5);
        fb.clear_color([1, 0, 3, 1], 7);
        fb.clear_depth([-5, -5, 100, 100]);
        // y = 0 is the bottom row.
        assert_eq!(&fb.color[12..16], &[0, 7, 7, 0]);
        assert_eq!(fb.color.iter().filter(|&&c| c == 7).count(), 2);
        assert!(fb.depth.iter().all(|&d| d == 0.0));
    }
}
