//! # Render Queue Benchmark
//!
//! Cost of pushing commands and draining them on the render thread.
//!
//! Run with: `cargo bench --package gled_rendering`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gled_core::memory::{Allocator, BumpAllocator};
use gled_rendering::{BufferId, HeadlessDevice, PolygonFace, PolygonMode, RenderCommand, RenderCommandQueue};

/// Benchmark: push + drain of cheap state commands.
fn bench_push_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_drain_polygon_mode");

    for count in [16_usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let queue = RenderCommandQueue::new();
            let sender = queue.sender();
            let mut device = HeadlessDevice::new();
            let frame = BumpAllocator::new(1 << 16).unwrap();

            b.iter(|| {
                for _ in 0..count {
                    sender
                        .push(RenderCommand::polygon_mode(PolygonFace::FrontAndBack, PolygonMode::Fill))
                        .unwrap();
                }
                black_box(queue.drain(&mut device, &frame));
            });
        });
    }

    group.finish();
}

/// Benchmark: generate commands whose names are lent from the frame arena.
fn bench_generate_buffers(c: &mut Criterion) {
    let queue = RenderCommandQueue::new();
    let mut device = HeadlessDevice::new();
    let frame = BumpAllocator::labeled("frame", 1 << 20).unwrap();

    c.bench_function("gen_buffers_x64_per_frame", |b| {
        b.iter(|| {
            for _ in 0..64 {
                queue.push(RenderCommand::gen_buffers(4, |result| {
                    black_box(result.map(<[BufferId]>::len).ok());
                }));
            }
            black_box(queue.drain(&mut device, &frame));
            frame.reset().unwrap();
        });
    });
}

criterion_group!(benches, bench_push_drain, bench_generate_buffers);
criterion_main!(benches);
