//! # GPU Handle Slots
//!
//! Engine-side owners of GPU objects created through the command queue.
//!
//! A slot is created on any thread. It pushes the generate command and is
//! `Pending` until the render thread's drain runs the continuation, after
//! which it is `Ready` (or `Failed`). Dropping a slot pushes the matching
//! delete. If the slot is dropped before its names arrive, the continuation
//! deletes them as soon as they are produced.
//!
//! ```text
//!   request ──> Pending ──drain──> Ready ──drop──> delete pushed
//!                  │
//!                  └──drop──> Abandoned ──drain──> delete pushed
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::RenderCommand;
use crate::device::{BufferId, TextureId};
use crate::error::{GraphicsError, GraphicsResult};
use crate::queue::RenderCommandSender;

/// Where a slot is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    /// Waiting for the render thread.
    Pending,
    /// Names available.
    Ready,
    /// Generation failed with this error.
    Failed(GraphicsError),
}

enum SlotState<H> {
    Pending,
    Ready(H),
    Failed(GraphicsError),
    /// Owner dropped while pending; the continuation cleans up.
    Abandoned,
}

/// State shared between an owner and its pending continuation.
struct Slot<H> {
    state: Arc<Mutex<SlotState<H>>>,
    sender: RenderCommandSender,
}

impl<H: Clone> Slot<H> {
    fn new(sender: &RenderCommandSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState::Pending)),
            sender: sender.clone(),
        }
    }

    /// Builds the continuation body: store the result, or delete on arrival
    /// if the owner is gone.
    fn completion<D>(&self, delete: D) -> impl FnOnce(GraphicsResult<H>) + Send + 'static
    where
        H: Send + 'static,
        D: FnOnce(H) -> RenderCommand + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let sender = self.sender.clone();
        move |result| {
            let mut state = state.lock();
            if matches!(*state, SlotState::Abandoned) {
                if let Ok(names) = result {
                    push_delete(&sender, delete(names));
                }
                return;
            }
            *state = match result {
                Ok(names) => SlotState::Ready(names),
                Err(err) => SlotState::Failed(err),
            };
        }
    }

    fn status(&self) -> SlotStatus {
        match &*self.state.lock() {
            SlotState::Pending | SlotState::Abandoned => SlotStatus::Pending,
            SlotState::Ready(_) => SlotStatus::Ready,
            SlotState::Failed(err) => SlotStatus::Failed(err.clone()),
        }
    }

    fn get(&self) -> Option<H> {
        match &*self.state.lock() {
            SlotState::Ready(names) => Some(names.clone()),
            _ => None,
        }
    }

    /// Releases the owner's claim, pushing `delete` if the names are live.
    fn abandon(&self, delete: impl FnOnce(H) -> RenderCommand) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, SlotState::Abandoned) {
            SlotState::Ready(names) => push_delete(&self.sender, delete(names)),
            SlotState::Pending | SlotState::Failed(_) | SlotState::Abandoned => {}
        }
    }
}

fn push_delete(sender: &RenderCommandSender, command: RenderCommand) {
    if let Err(err) = sender.push(command) {
        tracing::warn!(error = %err, "GPU objects leaked, render queue gone");
    }
}

// ============================================================================
// Buffers
// ============================================================================

/// A set of GPU buffers owned by an engine object (e.g. a renderable's
/// vertex and index buffers).
pub struct GpuBuffers {
    count: usize,
    slot: Slot<Vec<BufferId>>,
}

impl GpuBuffers {
    /// Requests `count` buffers from the render thread.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::QueueClosed`] if the queue is gone.
    pub fn request(count: usize, sender: &RenderCommandSender) -> GraphicsResult<Self> {
        let slot = Slot::new(sender);
        let complete = slot.completion(RenderCommand::delete_buffers);
        sender.push(RenderCommand::gen_buffers(count, move |result| {
            complete(result.map(<[BufferId]>::to_vec));
        }))?;
        Ok(Self { count, slot })
    }

    /// Number of buffers requested.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> SlotStatus {
        self.slot.status()
    }

    /// Whether the names have arrived.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == SlotStatus::Ready
    }

    /// The buffer names, once ready.
    #[must_use]
    pub fn ids(&self) -> Option<Vec<BufferId>> {
        self.slot.get()
    }
}

impl Drop for GpuBuffers {
    fn drop(&mut self) {
        self.slot.abandon(RenderCommand::delete_buffers);
    }
}

impl std::fmt::Debug for GpuBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffers")
            .field("count", &self.count)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Texture
// ============================================================================

/// One GPU texture owned by an engine object.
pub struct GpuTexture {
    slot: Slot<TextureId>,
}

impl GpuTexture {
    /// Requests a texture from the render thread.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::QueueClosed`] if the queue is gone.
    pub fn request(sender: &RenderCommandSender) -> GraphicsResult<Self> {
        let slot = Slot::new(sender);
        sender.push(RenderCommand::gen_texture(
            slot.completion(RenderCommand::delete_texture),
        ))?;
        Ok(Self { slot })
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> SlotStatus {
        self.slot.status()
    }

    /// The texture name, once ready.
    #[must_use]
    pub fn id(&self) -> Option<TextureId> {
        self.slot.get()
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.slot.abandon(RenderCommand::delete_texture);
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use crate::queue::RenderCommandQueue;
    use gled_core::memory::BumpAllocator;

    #[test]
    fn test_buffers_become_ready_and_are_deleted_on_drop() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(4096).unwrap();

        let buffers = GpuBuffers::request(2, &queue.sender()).unwrap();
        assert_eq!(buffers.status(), SlotStatus::Pending);
        assert!(buffers.ids().is_none());

        queue.drain(&mut device, &frame);
        assert!(buffers.is_ready());
        assert_eq!(buffers.ids(), Some(vec![BufferId(1), BufferId(2)]));

        drop(buffers);
        assert_eq!(queue.len(), 1);
        queue.drain(&mut device, &frame);
        assert!(device.live_buffers().is_empty());
    }

    #[test]
    fn test_abandoned_texture_deleted_in_same_drain() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(4096).unwrap();

        let texture = GpuTexture::request(&queue.sender()).unwrap();
        drop(texture);

        let stats = queue.drain(&mut device, &frame);
        assert_eq!(stats.executed, 2);
        assert!(device.live_textures().is_empty());
    }

    #[test]
    fn test_failed_generation_is_reported() {
        let queue = RenderCommandQueue::new();
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(4096).unwrap();
        let error = GraphicsError::Device {
            code: 0x0505,
            message: "out of memory".into(),
        };
        device.fail_next(error.clone());

        let texture = GpuTexture::request(&queue.sender()).unwrap();
        queue.drain(&mut device, &frame);

        assert_eq!(texture.status(), SlotStatus::Failed(error));
        assert!(texture.id().is_none());
        drop(texture);
        assert!(queue.is_empty());
    }
}
