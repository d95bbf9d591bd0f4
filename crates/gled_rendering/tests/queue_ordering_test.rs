//! Integration tests for cross-thread command ordering.

use gled_core::memory::{Allocator, BumpAllocator};
use gled_rendering::{
    BufferId, DrainStats, GpuBuffers, HeadlessDevice, RenderCommand, RenderCommandQueue,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

const PRODUCERS: u32 = 4;
const PER_PRODUCER: u32 = 250;

#[test]
fn test_per_thread_fifo_under_contention() {
    let queue = RenderCommandQueue::new();
    let mut device = HeadlessDevice::new();
    let frame = BumpAllocator::labeled("frame", 1 << 16).unwrap();
    let executed = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let sender = queue.sender();
            let executed = Arc::clone(&executed);
            scope.spawn(move || {
                for sequence in 0..PER_PRODUCER {
                    let executed = Arc::clone(&executed);
                    sender
                        .push(RenderCommand::gen_texture(move |_| {
                            executed.lock().push((producer, sequence));
                        }))
                        .unwrap();
                }
            });
        }
    });

    let stats = queue.drain(&mut device, &frame);
    assert_eq!(stats.executed, (PRODUCERS * PER_PRODUCER) as usize);

    let executed = executed.lock();
    for producer in 0..PRODUCERS {
        let order: Vec<u32> = executed
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|&(_, sequence)| sequence)
            .collect();
        assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

#[test]
fn test_a_before_b_with_interleaved_producers() {
    let queue = RenderCommandQueue::new();
    let mut device = HeadlessDevice::new();
    let frame = BumpAllocator::new(1 << 16).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    thread::scope(|scope| {
        let noisy = queue.sender();
        scope.spawn(move || {
            for _ in 0..100 {
                noisy.push(RenderCommand::delete_textures(Vec::new())).unwrap();
            }
        });

        let sender = queue.sender();
        let log_a = Arc::clone(&order);
        let log_b = Arc::clone(&order);
        scope.spawn(move || {
            sender
                .push(RenderCommand::gen_texture(move |_| log_a.lock().push('A')))
                .unwrap();
            sender
                .push(RenderCommand::gen_texture(move |_| log_b.lock().push('B')))
                .unwrap();
        });
    });

    queue.drain(&mut device, &frame);
    assert_eq!(*order.lock(), vec!['A', 'B']);
}

#[test]
fn test_generate_three_buffers_single_invocation() {
    let queue = RenderCommandQueue::new();
    let mut device = HeadlessDevice::new();
    let frame = BumpAllocator::labeled("frame", 4096).unwrap();
    let lengths = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&lengths);
    let loader = thread::spawn({
        let sender = queue.sender();
        move || {
            sender
                .push(RenderCommand::gen_buffers(3, move |result| {
                    sink.lock().push(result.map(<[BufferId]>::len).unwrap_or(0));
                }))
                .unwrap();
        }
    });
    loader.join().unwrap();

    assert_eq!(queue.drain(&mut device, &frame), DrainStats { executed: 1, failed: 0 });
    assert_eq!(*lengths.lock(), vec![3]);

    // The names were lent from the frame arena and are gone again.
    assert_eq!(frame.live_objects(), 0);
    frame.reset().unwrap();
}

#[test]
fn test_slots_requested_from_loader_thread() {
    let queue = RenderCommandQueue::new();
    let mut device = HeadlessDevice::new();
    let frame = BumpAllocator::new(4096).unwrap();

    let sender = queue.sender();
    let buffers = thread::spawn(move || GpuBuffers::request(2, &sender).unwrap())
        .join()
        .unwrap();

    queue.drain(&mut device, &frame);
    assert_eq!(buffers.ids(), Some(vec![BufferId(1), BufferId(2)]));

    thread::spawn(move || drop(buffers)).join().unwrap();

    queue.drain(&mut device, &frame);
    assert!(device.live_buffers().is_empty());
}
