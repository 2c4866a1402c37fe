//! Performance benchmarks for the pixel transfer codec.
//!
//! Measures encode and decode throughput per format for a full-size frame,
//! which bounds how fast the controller can turn a received payload into an
//! image.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench pixel_codec_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use phantom_core::Resolution;
use phantom_image::{PixelMatrix, TransferFormat, decode, encode};
use std::hint::black_box;

const FORMATS: [TransferFormat; 4] = [
    TransferFormat::P8,
    TransferFormat::P16,
    TransferFormat::P10,
    TransferFormat::P12L,
];

/// A 1280x800 frame with 10-bit values.
fn create_frame() -> PixelMatrix {
    let resolution = Resolution::new(1280, 800);
    let pixels = (0..resolution.pixel_count())
        .map(|i| (i % 1024) as u16)
        .collect();
    PixelMatrix::new(resolution, pixels).unwrap()
}

/// Benchmark encoding a full frame per format.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");
    let frame = create_frame();
    group.throughput(Throughput::Elements(frame.pixels().len() as u64));

    for format in FORMATS {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, &format| {
            b.iter(|| black_box(encode(black_box(&frame), format)));
        });
    }

    group.finish();
}

/// Benchmark decoding a full frame per format.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");
    let frame = create_frame();
    group.throughput(Throughput::Elements(frame.pixels().len() as u64));

    for format in FORMATS {
        let bytes = encode(&frame, format);
        group.bench_with_input(BenchmarkId::from_parameter(format), &bytes, |b, bytes| {
            b.iter(|| black_box(decode(black_box(bytes), frame.resolution(), format).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
