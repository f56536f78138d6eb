//! 1-bit indexed framebuffer
//!
//! Pixels are palette indices 0 (background) and 1 (ink), packed MSB-first
//! with each row padded to a whole byte, the same layout as the device's
//! display memory.

use thiserror::Error;

/// Logical width of the reference device screen
pub const DEVICE_WIDTH: u32 = 64;
/// Logical height of the reference device screen
pub const DEVICE_HEIGHT: u32 = 128;

/// Packed buffer length did not match the declared dimensions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bitmap {width}x{height} needs {expected} bytes, got {actual}")]
pub struct BitmapSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Blank (all background) bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; Self::packed_len(width, height)],
        }
    }

    /// Blank bitmap with the reference device dimensions.
    pub fn device() -> Self {
        Self::new(DEVICE_WIDTH, DEVICE_HEIGHT)
    }

    /// Wrap already-packed pixel data.
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BitmapSizeError> {
        let expected = Self::packed_len(width, height);
        if data.len() != expected {
            return Err(BitmapSizeError {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per packed row.
    pub fn stride(&self) -> usize {
        self.width.div_ceil(8) as usize
    }

    pub fn as_packed(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y); out-of-bounds reads as background.
    pub fn get(&self, x: u32, y: u32) -> bool {
        match self.locate(x, y) {
            Some((byte, mask)) => self.data[byte] & mask != 0,
            None => false,
        }
    }

    /// Set pixel at (x, y). Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if let Some((byte, mask)) = self.locate(x, y) {
            if on {
                self.data[byte] |= mask;
            } else {
                self.data[byte] &= !mask;
            }
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Fill a rectangle, clipped to the bitmap.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, on: bool) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y..y_end {
            for px in x..x_end {
                self.set(px, py, on);
            }
        }
    }

    /// Copy the ink pixels of `src` with its top-left corner at (x, y).
    /// Background pixels leave the destination as it was.
    pub fn blit(&mut self, src: &Bitmap, x: u32, y: u32) {
        for sy in 0..src.height {
            for sx in 0..src.width {
                if src.get(sx, sy) {
                    self.set(x.saturating_add(sx), y.saturating_add(sy), true);
                }
            }
        }
    }

    /// Number of ink pixels.
    pub fn count_on(&self) -> usize {
        // Row padding bits are never set, so a plain popcount is exact.
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    fn packed_len(width: u32, height: u32) -> usize {
        width.div_ceil(8) as usize * height as usize
    }

    fn locate(&self, x: u32, y: u32) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let byte = y as usize * self.stride() + (x / 8) as usize;
        let mask = 0x80u8 >> (x % 8);
        Some((byte, mask))
    }
}
