//! # Allocator Benchmark
//!
//! Hot-path cost of the tier allocators:
//! - bump allocate + reset per simulated frame
//! - heap allocate + release
//! - typed array construction in the frame arena
//!
//! Run with: `cargo bench --package gled_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gled_core::memory::{Alignment, Allocator, BumpAllocator, HeapAllocator, OwnedSlice};

/// Allocations made per simulated frame.
const ALLOCATIONS_PER_FRAME: usize = 1_000;

/// Benchmark: a frame's worth of small bump allocations followed by a reset.
fn bench_bump_frame(c: &mut Criterion) {
    let arena = BumpAllocator::new(1 << 20).unwrap();

    c.bench_function("bump_frame_1000x64", |b| {
        b.iter(|| {
            for _ in 0..ALLOCATIONS_PER_FRAME {
                black_box(arena.allocate(64).unwrap());
            }
            arena.reset().unwrap();
        });
    });
}

/// Benchmark: aligned bump allocations at several alignments.
fn bench_bump_aligned(c: &mut Criterion) {
    let arena = BumpAllocator::new(1 << 22).unwrap();
    let mut group = c.benchmark_group("bump_aligned");

    for alignment in [4_usize, 16, 64] {
        let alignment = Alignment::new(alignment);
        group.bench_with_input(
            BenchmarkId::from_parameter(alignment.get()),
            &alignment,
            |b, &alignment| {
                b.iter(|| {
                    for _ in 0..ALLOCATIONS_PER_FRAME {
                        black_box(arena.allocate_aligned(48, alignment).unwrap());
                    }
                    arena.reset().unwrap();
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: heap allocate + release pairs.
fn bench_heap_round_trip(c: &mut Criterion) {
    let heap = HeapAllocator::new(1 << 24);

    c.bench_function("heap_allocate_release_64", |b| {
        b.iter(|| {
            let block = heap.allocate(black_box(64)).unwrap();
            heap.release(block);
        });
    });
}

/// Benchmark: zeroed scratch arrays in the frame arena.
fn bench_frame_scratch_arrays(c: &mut Criterion) {
    let frame = BumpAllocator::labeled("frame", 1 << 22).unwrap();

    c.bench_function("frame_scratch_u32x256", |b| {
        b.iter(|| {
            {
                let scratch = OwnedSlice::<u32>::zeroed_in(256, &frame).unwrap();
                black_box(scratch.as_bytes().len());
            }
            frame.reset().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_bump_frame,
    bench_bump_aligned,
    bench_heap_round_trip,
    bench_frame_scratch_arrays,
);

criterion_main!(benches);
