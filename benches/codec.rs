//! Benchmarks for encode/decode sessions.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use webp_session::{DecodeSession, EncodeOption, EncodeSession, ImageHandle};

/// Generate a gradient RGBA frame for benchmarking.
fn gradient_frame(width: u32, height: u32, shift: u32) -> ImageHandle<'static> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((((x + shift) * 255) / width.max(1)) as u8);
            data.push(((y * 255) / height.max(1)) as u8);
            data.push((((x + y) * 127) / (width + height).max(1)) as u8);
            data.push(255);
        }
    }
    ImageHandle::from_rgba(&data, width, height).unwrap()
}

fn encode(frames: &[ImageHandle<'_>], quality: u8) -> Vec<u8> {
    let mut session = EncodeSession::new();
    session.set_option(EncodeOption::Quality(quality)).unwrap();
    for frame in frames {
        session.append_frame(frame).unwrap();
    }
    session.finalize().unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for &(width, height) in &[(64, 64), (256, 256)] {
        let frame = [gradient_frame(width, height, 0)];
        group.throughput(Throughput::Elements((width * height) as u64));

        for quality in [85u8, 100] {
            group.bench_with_input(
                BenchmarkId::new(format!("q{}", quality), format!("{}x{}", width, height)),
                &frame,
                |b, frame| {
                    b.iter(|| encode(black_box(frame), quality));
                },
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &(width, height) in &[(64, 64), (256, 256)] {
        let webp = encode(&[gradient_frame(width, height, 0)], 100);
        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(
            BenchmarkId::new("rows", format!("{}x{}", width, height)),
            &webp,
            |b, webp| {
                let mut row = vec![0u8; width as usize * 4];
                b.iter(|| {
                    let mut session = DecodeSession::new();
                    session.decode(black_box(webp)).unwrap();
                    let frame = session.frame(0).unwrap();
                    for y in 0..frame.height() {
                        frame.read_row(y, &mut row).unwrap();
                    }
                    black_box(&row);
                });
            },
        );
    }

    group.finish();
}

fn bench_animation(c: &mut Criterion) {
    let mut group = c.benchmark_group("animation");

    let frames: Vec<_> = (0..3)
        .map(|i| {
            let mut f = gradient_frame(128, 128, i * 10);
            f.set_frame_delay(100).unwrap();
            f
        })
        .collect();
    let webp = encode(&frames, 100);

    group.bench_function("encode_3_frames", |b| {
        b.iter(|| encode(black_box(&frames), 100));
    });

    group.bench_function("decode_3_frames", |b| {
        b.iter(|| {
            let mut session = DecodeSession::new();
            session.decode(black_box(&webp)).unwrap();
            session.frame_count()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_animation);
criterion_main!(benches);
