//! Decode throughput, compared against `liblzma`'s own decoder.
//!
//! This crate has no encoder, so the compressed fixtures are produced at
//! bench time by `liblzma` itself rather than checked in, keeping the
//! benchmark self-contained.

use std::{
    hint::black_box,
    io::{Cursor, Read, Write},
};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use liblzma::{bufread::XzEncoder, read::XzDecoder, stream::Check};

const TEXT: &str = include_str!("corpus.txt");

fn compress_with_liblzma(data: &[u8], preset: u32) -> Vec<u8> {
    let mut encoder = XzEncoder::new_stream(
        Cursor::new(data),
        liblzma::stream::Stream::new_easy_encoder(preset, Check::None).unwrap(),
    );
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).unwrap();
    compressed
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("xz_decode");
    let text_bytes = TEXT.as_bytes();
    group.throughput(Throughput::Bytes(text_bytes.len() as u64));

    for preset in [0u32, 6, 9] {
        let compressed = compress_with_liblzma(text_bytes, preset);

        group.bench_with_input(
            BenchmarkId::new("unxz_core", preset),
            &compressed,
            |b, compressed| {
                b.iter(|| {
                    let mut out = Vec::new();
                    unxz_core::decompress(Cursor::new(black_box(compressed.as_slice())), &mut out)
                        .unwrap();
                    black_box(out)
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("liblzma", preset),
            &compressed,
            |b, compressed| {
                b.iter(|| {
                    let mut decoder = XzDecoder::new(black_box(compressed.as_slice()));
                    let mut out = Vec::new();
                    decoder.read_to_end(&mut out).unwrap();
                    black_box(out)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
