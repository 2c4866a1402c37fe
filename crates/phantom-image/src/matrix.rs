//! Decoded image data.
//!
//! A [`PixelMatrix`] holds one 16-bit value per pixel, row-major, regardless
//! of the transfer format the image arrived in. Construction checks that the
//! pixel count matches the resolution:
//!
//! ```
//! use phantom_core::Resolution;
//! use phantom_image::PixelMatrix;
//!
//! let matrix = PixelMatrix::from_rows(&[vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
//! assert_eq!(matrix.resolution(), Resolution::new(3, 2));
//! assert_eq!(matrix.get(1, 0), Some(4));
//!
//! assert!(PixelMatrix::new(Resolution::new(2, 2), vec![0; 3]).is_err());
//! ```

use phantom_core::{Error, Resolution, Result};
use serde::{Deserialize, Serialize};

/// Row-major grid of pixel values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelMatrix {
    resolution: Resolution,
    pixels: Vec<u16>,
}

impl PixelMatrix {
    /// Wrap `pixels` laid out row-major at `resolution`.
    ///
    /// # Errors
    /// Returns `Error::PixelCount` unless `pixels.len() == width * height`.
    pub fn new(resolution: Resolution, pixels: Vec<u16>) -> Result<Self> {
        if pixels.len() != resolution.pixel_count() {
            return Err(Error::PixelCount {
                width: resolution.width,
                height: resolution.height,
                actual: pixels.len(),
            });
        }
        Ok(Self { resolution, pixels })
    }

    /// All-zero matrix.
    pub fn zeros(resolution: Resolution) -> Self {
        Self {
            resolution,
            pixels: vec![0; resolution.pixel_count()],
        }
    }

    /// One-dimensional input becomes a single row (`height == 1`).
    pub fn from_flat(pixels: Vec<u16>) -> Self {
        let width = u32::try_from(pixels.len()).unwrap_or(u32::MAX);
        let mut pixels = pixels;
        pixels.truncate(width as usize);
        Self {
            resolution: Resolution::new(width, 1),
            pixels,
        }
    }

    /// Build from rows of equal length.
    ///
    /// # Errors
    /// Returns `Error::PixelCount` if the rows differ in length.
    pub fn from_rows(rows: &[Vec<u16>]) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let resolution = Resolution::new(
            u32::try_from(width).unwrap_or(u32::MAX),
            u32::try_from(rows.len()).unwrap_or(u32::MAX),
        );
        let pixels: Vec<u16> = rows.iter().flatten().copied().collect();
        if rows.iter().any(|row| row.len() != width) {
            return Err(Error::PixelCount {
                width: resolution.width,
                height: resolution.height,
                actual: pixels.len(),
            });
        }
        Self::new(resolution, pixels)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.resolution.width as usize
    }

    pub fn height(&self) -> usize {
        self.resolution.height as usize
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u16> {
        self.pixels
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        if col >= self.width() {
            return None;
        }
        self.pixels.get(row * self.width() + col).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, value: u16) -> bool {
        if col >= self.width() || row >= self.height() {
            return false;
        }
        let width = self.width();
        self.pixels[row * width + col] = value;
        true
    }

    pub fn row(&self, row: usize) -> Option<&[u16]> {
        let width = self.width();
        self.pixels.get(row * width..(row + 1) * width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u16]> {
        self.pixels.chunks(self.width().max(1))
    }

    /// Largest pixel value, 0 for an empty matrix.
    pub fn max(&self) -> u16 {
        self.pixels.iter().copied().max().unwrap_or(0)
    }
}
