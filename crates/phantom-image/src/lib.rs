//! Pixel transfer formats of the Phantom camera.
//!
//! Images travel over the data channel in one of four packings (P8, P16,
//! P10, P12L, plus the mirrored P8R and P16R). This crate converts between a
//! [`PixelMatrix`] and those payloads.
//!
//! ```
//! use phantom_image::{PixelMatrix, TransferFormat};
//!
//! let matrix = PixelMatrix::from_flat(vec![1, 2, 3, 4]);
//! let bytes = TransferFormat::P10.encode(&matrix);
//! assert_eq!(bytes.len(), 5);
//! assert_eq!(TransferFormat::P10.decode(&bytes, matrix.resolution()).unwrap(), matrix);
//! ```

pub mod codec;
pub mod format;
pub mod matrix;
pub mod scale;

pub use codec::{decode, encode};
pub use format::TransferFormat;
pub use matrix::PixelMatrix;
pub use scale::downscale;
