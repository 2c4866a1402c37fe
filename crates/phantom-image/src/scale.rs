//! Bit-depth reduction for display and export.

use crate::PixelMatrix;

/// Normalize `matrix` into `[0, 2^(bits-1)]` by dividing every pixel by the
/// matrix maximum and scaling.
///
/// `bits` is clamped to `1..=16`. An all-zero matrix stays all zero.
///
/// ```
/// use phantom_image::{PixelMatrix, downscale};
///
/// let scaled = downscale(&PixelMatrix::from_flat(vec![0, 2048, 4096]), 8);
/// assert_eq!(scaled.pixels(), &[0, 64, 128]);
/// ```
pub fn downscale(matrix: &PixelMatrix, bits: u32) -> PixelMatrix {
    let top = 1u64 << (bits.clamp(1, 16) - 1);
    let max = u64::from(matrix.max());

    let mut scaled = PixelMatrix::zeros(matrix.resolution());
    if max == 0 {
        return scaled;
    }
    for (row, values) in matrix.rows().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            scaled.set(row, col, (u64::from(value) * top / max) as u16);
        }
    }
    scaled
}
