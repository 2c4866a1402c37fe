//! Image sources the mock camera serves.

use phantom_core::Resolution;
use phantom_image::PixelMatrix;
use rand::Rng;

/// Produces the pixel matrix returned by the next image request.
pub trait ImageSource: Send + 'static {
    fn grab(&mut self, resolution: Resolution) -> PixelMatrix;
}

/// Deterministic diagonal ramp, so tests can compare received images exactly.
///
/// Pixel `(row, col)` is `(row + col) * step` wrapped at `max_value + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientImage {
    pub max_value: u16,
    pub step: u16,
}

impl Default for GradientImage {
    fn default() -> Self {
        // 10 bits, so every transfer format carries the image unchanged
        Self {
            max_value: 1023,
            step: 1,
        }
    }
}

impl ImageSource for GradientImage {
    fn grab(&mut self, resolution: Resolution) -> PixelMatrix {
        let modulus = u64::from(self.max_value) + 1;
        let mut matrix = PixelMatrix::zeros(resolution);
        for row in 0..resolution.height as usize {
            for col in 0..resolution.width as usize {
                let value = ((row + col) as u64 * u64::from(self.step)) % modulus;
                matrix.set(row, col, value as u16);
            }
        }
        matrix
    }
}

/// Uniform random noise in `0..=max_value`, fresh for every grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseImage {
    pub max_value: u16,
}

impl Default for NoiseImage {
    fn default() -> Self {
        Self { max_value: 4095 }
    }
}

impl ImageSource for NoiseImage {
    fn grab(&mut self, resolution: Resolution) -> PixelMatrix {
        let mut rng = rand::rng();
        let pixels = (0..resolution.pixel_count())
            .map(|_| rng.random_range(0..=self.max_value))
            .collect();
        PixelMatrix::new(resolution, pixels).unwrap_or_else(|_| PixelMatrix::zeros(resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_is_deterministic() {
        let mut source = GradientImage::default();
        let res = Resolution::new(8, 4);
        let first = source.grab(res);
        assert_eq!(first, source.grab(res));
        assert_eq!(first.get(0, 0), Some(0));
        assert_eq!(first.get(3, 7), Some(10));
    }

    #[test]
    fn test_gradient_wraps() {
        let mut source = GradientImage {
            max_value: 3,
            step: 1,
        };
        let image = source.grab(Resolution::new(6, 1));
        assert_eq!(image.pixels(), &[0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_noise_respects_max() {
        let mut source = NoiseImage { max_value: 255 };
        let image = source.grab(Resolution::new(64, 64));
        assert_eq!(image.pixels().len(), 64 * 64);
        assert!(image.max() <= 255);
    }
}
