//! # Render Command Queue
//!
//! The FIFO through which any thread asks the render thread to touch the
//! graphics context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ loader (n)   │──push──┐
//! └──────────────┘        │      ┌──────────────────────┐      ┌─────────────┐
//! ┌──────────────┐        ├─────>│  unbounded channel   │─────>│ render loop │
//! │ update       │──push──┤      └──────────────────────┘ pop  │ (drain)     │
//! └──────────────┘        │                                    └─────────────┘
//! ┌──────────────┐        │
//! │ render       │──push──┘
//! └──────────────┘
//! ```
//!
//! Producers hold cloneable [`RenderCommandSender`]s. The consuming end,
//! [`RenderCommandQueue`], is neither `Send` nor `Sync`: it stays on the
//! thread that created it, which is the thread owning the graphics context.
//!
//! Commands pushed by one thread execute in the order that thread pushed
//! them. The drain is live: a command pushed while the drain is running is
//! executed in the same drain if it arrives before the queue empties.

use std::marker::PhantomData;

use crossbeam_channel::{unbounded, Receiver, Sender};
use gled_core::memory::Allocator;

use crate::command::RenderCommand;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};

/// Outcome of one drain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Commands that completed successfully.
    pub executed: usize,
    /// Commands whose execution failed (logged, not retried).
    pub failed: usize,
}

impl DrainStats {
    /// Commands processed in total.
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.executed + self.failed
    }
}

/// The render thread's end of the command channel.
pub struct RenderCommandQueue {
    sender: Sender<RenderCommand>,
    receiver: Receiver<RenderCommand>,
    /// Pins the queue to its creating thread.
    _render_thread: PhantomData<*const ()>,
}

impl RenderCommandQueue {
    /// Creates an empty queue owned by the calling thread.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            _render_thread: PhantomData,
        }
    }

    /// Creates a producer handle (clone for more producers).
    #[must_use]
    pub fn sender(&self) -> RenderCommandSender {
        RenderCommandSender {
            sender: self.sender.clone(),
        }
    }

    /// Appends a command from the render thread itself.
    #[inline]
    pub fn push(&self, command: RenderCommand) {
        tracing::trace!(command = command.name(), "render command queued");
        // The queue holds the receiver, so the channel cannot be disconnected.
        if self.sender.send(command).is_err() {
            tracing::error!("render command channel disconnected");
        }
    }

    /// Removes the oldest command, if any.
    #[inline]
    #[must_use]
    pub fn pop(&self) -> Option<RenderCommand> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether no commands are pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Executes commands until the queue is empty.
    ///
    /// Command failures are logged and counted; they never stop the drain.
    /// Name arrays for generate commands come from `scratch`, normally the
    /// frame arena.
    pub fn drain(&self, device: &mut dyn GraphicsDevice, scratch: &dyn Allocator) -> DrainStats {
        let mut stats = DrainStats::default();

        while let Some(command) = self.pop() {
            let name = command.name();
            match command.execute(device, scratch) {
                Ok(()) => {
                    stats.executed += 1;
                    tracing::trace!(command = name, "render command executed");
                }
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(command = name, error = %err, "render command failed");
                }
            }
        }

        if stats.total() > 0 {
            tracing::debug!(executed = stats.executed, failed = stats.failed, "render queue drained");
        }
        stats
    }
}

impl Default for RenderCommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RenderCommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCommandQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// Handle for pushing commands from any thread.
#[derive(Clone, Debug)]
pub struct RenderCommandSender {
    sender: Sender<RenderCommand>,
}

impl RenderCommandSender {
    /// Appends a command. Never blocks beyond the channel's internal lock.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::QueueClosed`] if the queue has been dropped.
    #[inline]
    pub fn push(&self, command: RenderCommand) -> GraphicsResult<()> {
        let name = command.name();
        self.sender
            .send(command)
            .map_err(|_| GraphicsError::QueueClosed)?;
        tracing::trace!(command = name, "render command queued");
        Ok(())
    }

    /// Number of commands waiting for the render thread.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BufferId, PolygonFace, PolygonMode, TextureId};
    use crate::headless::HeadlessDevice;
    use gled_core::memory::BumpAllocator;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_push_does_not_execute() {
        let queue = RenderCommandQueue::new();
        let sender = queue.sender();
        let called = Arc::new(Mutex::new(false));

        let flag = Arc::clone(&called);
        sender
            .push(RenderCommand::gen_texture(move |_| *flag.lock() = true))
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert_eq!(sender.pending(), 1);
        assert!(!*called.lock());
    }

    #[test]
    fn test_pop_is_fifo() {
        let queue = RenderCommandQueue::new();
        queue.push(RenderCommand::delete_texture(TextureId(1)));
        queue.push(RenderCommand::delete_texture(TextureId(2)));

        assert!(matches!(queue.pop(), Some(RenderCommand::DeleteTexture { id: TextureId(1) })));
        assert!(matches!(queue.pop(), Some(RenderCommand::DeleteTexture { id: TextureId(2) })));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_generate_three_buffers_once() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::labeled("frame", 4096).unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&calls);
        queue.push(RenderCommand::gen_buffers(3, move |result| {
            sink.lock().push(result.map(<[BufferId]>::len));
        }));

        let stats = queue.drain(&mut device, &frame);
        assert_eq!(stats, DrainStats { executed: 1, failed: 0 });
        assert_eq!(*calls.lock(), vec![Ok(3)]);
        assert_eq!(device.live_buffers().len(), 3);

        // A second drain has nothing left to run.
        assert_eq!(queue.drain(&mut device, &frame).total(), 0);
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_drain_is_live() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(4096).unwrap();

        // The continuation pushes a follow-up while the drain is running.
        let follow_up = queue.sender();
        queue.push(RenderCommand::gen_texture(move |result| {
            let id = result.unwrap();
            follow_up.push(RenderCommand::delete_texture(id)).unwrap();
        }));

        let stats = queue.drain(&mut device, &frame);
        assert_eq!(stats.executed, 2);
        assert!(device.live_textures().is_empty());
    }

    #[test]
    fn test_failures_are_counted_not_fatal() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(256).unwrap();

        queue.push(RenderCommand::delete_buffers(vec![BufferId(42)]));
        queue.push(RenderCommand::polygon_mode(PolygonFace::FrontAndBack, PolygonMode::Line));

        let stats = queue.drain(&mut device, &frame);
        assert_eq!(stats, DrainStats { executed: 1, failed: 1 });
        assert_eq!(device.polygon_mode(PolygonFace::Front), PolygonMode::Line);
    }

    #[test]
    fn test_sender_reports_closed_queue() {
        let queue = RenderCommandQueue::new();
        let sender = queue.sender();
        drop(queue);

        let result = sender.push(RenderCommand::delete_texture(TextureId(1)));
        assert_eq!(result, Err(GraphicsError::QueueClosed));
    }
}
