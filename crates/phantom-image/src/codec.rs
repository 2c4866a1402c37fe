//! Pixel transfer codec.
//!
//! Conversion between a [`PixelMatrix`] and the packed byte payload of each
//! [`TransferFormat`]. Pixels are always visited row-major.
//!
//! | Format | Layout |
//! |---|---|
//! | P8, P8R | 1 byte per pixel, value masked to 8 bits |
//! | P16, P16R | 2 bytes per pixel, little-endian |
//! | P10 | 4 pixels in 5 bytes: `p0 << 30 \| p1 << 20 \| p2 << 10 \| p3`, big-endian |
//! | P12L | 2 pixels in 3 bytes: `p0 << 12 \| p1`, big-endian |
//!
//! The packed formats mask each pixel to its bit depth. When the pixel count
//! does not fill the last group, the partial group is left-aligned and only
//! the whole bytes it covers are written, matching
//! [`TransferFormat::byte_count`]; decoding zero-fills the bits that were not
//! transmitted.
//!
//! ```
//! use phantom_image::{PixelMatrix, TransferFormat, decode, encode};
//!
//! let matrix = PixelMatrix::from_flat(vec![4095, 1]);
//! let bytes = encode(&matrix, TransferFormat::P12L);
//! assert_eq!(bytes, [0xFF, 0xF0, 0x01]);
//!
//! let back = decode(&bytes, matrix.resolution(), TransferFormat::P12L).unwrap();
//! assert_eq!(back, matrix);
//! ```

use crate::{PixelMatrix, TransferFormat, format::Layout};
use phantom_core::{Error, Resolution, Result};

/// Encode `matrix` into the payload of `format`.
pub fn encode(matrix: &PixelMatrix, format: TransferFormat) -> Vec<u8> {
    let pixels = matrix.pixels();
    match format.layout() {
        Layout::Byte => pixels.iter().map(|&p| (p & 0xFF) as u8).collect(),
        Layout::Word => pixels.iter().flat_map(|&p| p.to_le_bytes()).collect(),
        Layout::Packed { bits, pixels: group } => {
            let mut out = Vec::with_capacity(format.byte_count(pixels.len()).unwrap_or_default());
            pack(pixels, bits, group, &mut out);
            out
        }
    }
}

/// Decode a `format` payload into a matrix of `resolution`.
///
/// # Errors
/// Returns `Error::CodecLength` if `bytes` is not exactly
/// [`format.payload_len(resolution)`](TransferFormat::payload_len) long, and
/// `Error::ImageTooLarge` if that length overflows.
pub fn decode(bytes: &[u8], resolution: Resolution, format: TransferFormat) -> Result<PixelMatrix> {
    let expected = format.payload_len(resolution)?;
    let count = resolution.pixel_count();
    if bytes.len() != expected {
        return Err(Error::CodecLength {
            format: format.token().to_string(),
            expected,
            actual: bytes.len(),
        });
    }

    let pixels = match format.layout() {
        Layout::Byte => bytes.iter().map(|&b| u16::from(b)).collect(),
        Layout::Word => bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
        Layout::Packed { bits, pixels: group } => unpack(bytes, bits, group, count),
    };
    PixelMatrix::new(resolution, pixels)
}

impl TransferFormat {
    /// Shorthand for [`encode`].
    pub fn encode(&self, matrix: &PixelMatrix) -> Vec<u8> {
        encode(matrix, *self)
    }

    /// Shorthand for [`decode`].
    ///
    /// # Errors
    /// See [`decode`].
    pub fn decode(&self, bytes: &[u8], resolution: Resolution) -> Result<PixelMatrix> {
        decode(bytes, resolution, *self)
    }
}

/// Bytes occupied by one full group.
fn group_bytes(bits: u32, group: usize) -> usize {
    bits as usize * group / 8
}

fn pack(pixels: &[u16], bits: u32, group: usize, out: &mut Vec<u8>) {
    let mask = (1u64 << bits) - 1;
    let full = group_bytes(bits, group);

    for chunk in pixels.chunks(group) {
        let mut acc = chunk
            .iter()
            .fold(0u64, |acc, &p| (acc << bits) | (u64::from(p) & mask));
        acc <<= bits as usize * (group - chunk.len());

        let be = acc.to_be_bytes();
        let written = bits as usize * chunk.len() / 8;
        out.extend_from_slice(&be[be.len() - full..][..written]);
    }
}

fn unpack(bytes: &[u8], bits: u32, group: usize, count: usize) -> Vec<u16> {
    let mask = (1u64 << bits) - 1;
    let full = group_bytes(bits, group);
    let mut pixels = Vec::with_capacity(count);

    for chunk in bytes.chunks(full) {
        let mut acc = chunk.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        acc <<= 8 * (full - chunk.len());

        // Fields come off the low end first; the last one extracted is the
        // first pixel of the group.
        let mut fields = Vec::with_capacity(group);
        for _ in 0..group {
            fields.push((acc & mask) as u16);
            acc >>= bits;
        }
        pixels.extend(fields.into_iter().rev());
    }

    pixels.resize(count, 0);
    pixels
}
