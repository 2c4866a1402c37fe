//! Property-based tests for the pixel transfer codec.
//!
//! Every format must reproduce matrices whose values fit its bit depth,
//! for every resolution whose pixel count fills whole packing groups.

use phantom_core::Resolution;
use phantom_image::{PixelMatrix, TransferFormat, decode, encode};
use proptest::prelude::*;

/// Strategy for a matrix with dimensions up to 32x16, values below `limit`,
/// and a pixel count divisible by `multiple`.
fn matrix(limit: u32, multiple: u32) -> impl Strategy<Value = PixelMatrix> {
    (1u32..=8, 1u32..=16).prop_flat_map(move |(w, h)| {
        let width = w * multiple;
        let count = (width * h) as usize;
        prop::collection::vec((0..limit).prop_map(|v| v as u16), count).prop_map(move |pixels| {
            PixelMatrix::new(Resolution::new(width, h), pixels)
                .expect("strategy produces matching pixel counts")
        })
    })
}

fn assert_round_trip(m: &PixelMatrix, format: TransferFormat) -> Result<(), TestCaseError> {
    let bytes = encode(m, format);
    prop_assert_eq!(Some(bytes.len()), format.byte_count(m.pixels().len()));
    let back = decode(&bytes, m.resolution(), format);
    prop_assert!(back.is_ok(), "decode failed: {:?}", back);
    prop_assert_eq!(&back.unwrap(), m);
    Ok(())
}

proptest! {
    /// Property: P16 and P16R are lossless over the full 16-bit range.
    #[test]
    fn prop_p16_roundtrip(m in matrix(1 << 16, 1)) {
        assert_round_trip(&m, TransferFormat::P16)?;
        assert_round_trip(&m, TransferFormat::P16R)?;
    }

    /// Property: P8 and P8R are lossless for values below 256.
    #[test]
    fn prop_p8_roundtrip(m in matrix(1 << 8, 1)) {
        assert_round_trip(&m, TransferFormat::P8)?;
        assert_round_trip(&m, TransferFormat::P8R)?;
    }

    /// Property: P12L is lossless for 12-bit values and even pixel counts.
    #[test]
    fn prop_p12l_roundtrip(m in matrix(1 << 12, 2)) {
        assert_round_trip(&m, TransferFormat::P12L)?;
    }

    /// Property: P10 is lossless for 10-bit values and pixel counts divisible by 4.
    #[test]
    fn prop_p10_roundtrip(m in matrix(1 << 10, 4)) {
        assert_round_trip(&m, TransferFormat::P10)?;
    }

    /// Property: P10 keeps the low 10 bits of deeper pixels.
    #[test]
    fn prop_p10_truncates_deeper_pixels(m in matrix(1 << 16, 4)) {
        let back = decode(&encode(&m, TransferFormat::P10), m.resolution(), TransferFormat::P10).unwrap();
        for (orig, got) in m.pixels().iter().zip(back.pixels()) {
            prop_assert_eq!(*got, orig & 0x3FF);
        }
    }

    /// Property: a payload of the wrong length never decodes.
    #[test]
    fn prop_wrong_length_rejected(m in matrix(1 << 8, 4), extra in 1usize..8) {
        for format in TransferFormat::ALL {
            let mut bytes = encode(&m, format);
            bytes.extend(std::iter::repeat_n(0u8, extra));
            prop_assert!(decode(&bytes, m.resolution(), format).is_err());
        }
    }
}
