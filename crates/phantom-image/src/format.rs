//! Transfer formats of the image data channel.
//!
//! A [`TransferFormat`] names how pixels are packed on the wire. The camera
//! knows each format by a numeric code in `img` requests and responses, and
//! by a token in `ximg` requests:
//!
//! | Format | Code | Bits | Bytes per pixel |
//! |---|---|---|---|
//! | P8 | 8 | 8 | 1 |
//! | P8R | -8 | 8 | 1 |
//! | P16 | 272 | 16 | 2 |
//! | P16R | -272 | 16 | 2 |
//! | P10 | 266 | 10 | 1.25 |
//! | P12L | (none) | 12 | 1.5 |
//!
//! # Parsing
//!
//! [`str::parse`] is strict and rejects unknown input with
//! `Error::UnknownFormat`. [`TransferFormat::parse_or_default`] falls back to
//! [`TransferFormat::P16`] instead, for operator input where a sensible
//! default beats an error.
//!
//! ```
//! use phantom_image::TransferFormat;
//!
//! let format: TransferFormat = "266".parse().unwrap();
//! assert_eq!(format, TransferFormat::P10);
//! assert_eq!(format.byte_count(8), Some(10));
//! assert!("P9".parse::<TransferFormat>().is_err());
//! ```
//!
//! # Payload sizes
//!
//! Sizes derived from a resolution the camera reports are computed with
//! checked arithmetic: [`TransferFormat::payload_len`] fails instead of
//! wrapping when the payload would not fit in `usize`.

use phantom_core::{Error, Resolution, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire pixel-packing format of an image transfer.
///
/// The `R` variants share the byte layout of their plain counterparts; the
/// suffix only changes how the camera frames the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransferFormat {
    /// One byte per pixel.
    P8,
    P8R,
    /// Two little-endian bytes per pixel.
    #[default]
    P16,
    P16R,
    /// Four 10-bit pixels packed into five bytes.
    P10,
    /// Two 12-bit pixels packed into three bytes.
    P12L,
}

/// Byte layout shared by one or more formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    Byte,
    Word,
    /// `pixels` values of `bits` bits each, packed big-endian into one group.
    Packed { bits: u32, pixels: usize },
}

impl TransferFormat {
    pub const ALL: [TransferFormat; 6] = [
        TransferFormat::P8,
        TransferFormat::P8R,
        TransferFormat::P16,
        TransferFormat::P16R,
        TransferFormat::P10,
        TransferFormat::P12L,
    ];

    /// Token used in `ximg` requests and on the command line.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            TransferFormat::P8 => "P8",
            TransferFormat::P8R => "P8R",
            TransferFormat::P16 => "P16",
            TransferFormat::P16R => "P16R",
            TransferFormat::P10 => "P10",
            TransferFormat::P12L => "P12L",
        }
    }

    /// Numeric code used in `img` requests and responses. `P12L` has none.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        match self {
            TransferFormat::P8 => Some(8),
            TransferFormat::P8R => Some(-8),
            TransferFormat::P16 => Some(272),
            TransferFormat::P16R => Some(-272),
            TransferFormat::P10 => Some(266),
            TransferFormat::P12L => None,
        }
    }

    /// Resolve a numeric format code.
    ///
    /// # Errors
    /// Returns `Error::UnknownFormat` for codes no format carries.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            8 => Ok(TransferFormat::P8),
            -8 => Ok(TransferFormat::P8R),
            272 => Ok(TransferFormat::P16),
            -272 => Ok(TransferFormat::P16R),
            266 => Ok(TransferFormat::P10),
            _ => Err(Error::UnknownFormat(code.to_string())),
        }
    }

    /// Resolve a token, alias or numeric code, falling back to
    /// [`TransferFormat::P16`] for unknown input.
    ///
    /// Use [`str::parse`] to reject unknown input instead.
    ///
    /// ```
    /// use phantom_image::TransferFormat;
    ///
    /// assert_eq!(TransferFormat::parse_or_default("P10"), TransferFormat::P10);
    /// assert_eq!(TransferFormat::parse_or_default("-8"), TransferFormat::P8R);
    /// assert_eq!(TransferFormat::parse_or_default("P99"), TransferFormat::P16);
    /// ```
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Average bytes per pixel (1.25 and 1.5 for the packed formats).
    #[must_use]
    pub fn bytes_per_pixel(&self) -> f64 {
        match self.layout() {
            Layout::Byte => 1.0,
            Layout::Word => 2.0,
            Layout::Packed { bits, .. } => f64::from(bits) / 8.0,
        }
    }

    /// Bytes needed for `pixel_count` pixels, rounded down, or `None` on
    /// overflow.
    ///
    /// Exact for packed formats only when `pixel_count` fills whole groups
    /// (multiples of 4 for P10, of 2 for P12L).
    #[must_use]
    pub fn byte_count(&self, pixel_count: usize) -> Option<usize> {
        match self.layout() {
            Layout::Byte => Some(pixel_count),
            Layout::Word => pixel_count.checked_mul(2),
            Layout::Packed { bits, .. } => pixel_count
                .checked_mul(bits as usize)
                .map(|total_bits| total_bits / 8),
        }
    }

    /// Payload length of a whole image of `resolution`.
    ///
    /// # Errors
    /// Returns `Error::ImageTooLarge` if the length overflows `usize`.
    pub fn payload_len(&self, resolution: Resolution) -> Result<usize> {
        resolution
            .checked_pixel_count()
            .and_then(|count| self.byte_count(count))
            .ok_or_else(|| Error::ImageTooLarge {
                width: resolution.width,
                height: resolution.height,
                format: self.token().to_string(),
            })
    }

    /// Largest pixel value the format carries without loss.
    #[must_use]
    pub fn max_value(&self) -> u16 {
        match self.layout() {
            Layout::Byte => u16::from(u8::MAX),
            Layout::Word => u16::MAX,
            Layout::Packed { bits, .. } => ((1u32 << bits) - 1) as u16,
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        match self {
            TransferFormat::P8 | TransferFormat::P8R => Layout::Byte,
            TransferFormat::P16 | TransferFormat::P16R => Layout::Word,
            TransferFormat::P10 => Layout::Packed { bits: 10, pixels: 4 },
            TransferFormat::P12L => Layout::Packed { bits: 12, pixels: 2 },
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl std::str::FromStr for TransferFormat {
    type Err = Error;

    /// Accepts tokens (case-insensitive), the short aliases `8`/`8R` and the
    /// numeric codes.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_uppercase().as_str() {
            "P8" | "8" => return Ok(TransferFormat::P8),
            "P8R" | "8R" => return Ok(TransferFormat::P8R),
            "P16" => return Ok(TransferFormat::P16),
            "P16R" => return Ok(TransferFormat::P16R),
            "P10" => return Ok(TransferFormat::P10),
            "P12L" => return Ok(TransferFormat::P12L),
            _ => {}
        }
        match s.parse::<i64>() {
            Ok(code) => TransferFormat::from_code(code),
            Err(_) => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}
