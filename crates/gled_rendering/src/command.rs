//! # Render Commands
//!
//! One variant per graphics-object lifecycle operation.
//!
//! Any thread may build a command; only the render thread executes it.
//! Generate variants carry a continuation that is always invoked exactly
//! once, with the new names on success or the error on failure.
//!
//! ```text
//!   loader thread                      render thread
//!   ─────────────                      ─────────────
//!   RenderCommand::gen_buffers(3, k) ─> execute(device, frame arena)
//!                                          ├─ ids = zeroed [BufferId; 3] in frame arena
//!                                          ├─ device.gen_buffers(&mut ids)
//!                                          └─ k(Ok(&ids))
//! ```

use std::fmt;

use bytemuck::Zeroable;
use gled_core::memory::{Allocator, OwnedSlice};

use crate::device::{BufferId, GraphicsDevice, PolygonFace, PolygonMode, TextureId};
use crate::error::{GraphicsError, GraphicsResult};

/// Continuation receiving freshly generated names.
///
/// The slice lives in the frame arena and is only valid for the call.
pub type NamesCallback<H> = Box<dyn for<'s> FnOnce(GraphicsResult<&'s [H]>) + Send>;

/// Continuation receiving one freshly generated texture.
pub type TextureCallback = Box<dyn FnOnce(GraphicsResult<TextureId>) + Send>;

/// A graphics-object lifecycle request.
pub enum RenderCommand {
    /// Change the raster mode.
    PolygonMode {
        /// Faces affected.
        face: PolygonFace,
        /// New mode.
        mode: PolygonMode,
    },
    /// Create `count` buffers.
    GenBuffers {
        /// Number of buffers.
        count: usize,
        /// Receives the names.
        on_complete: NamesCallback<BufferId>,
    },
    /// Delete buffers.
    DeleteBuffers {
        /// Names to delete.
        ids: Vec<BufferId>,
    },
    /// Create `count` textures.
    GenTextures {
        /// Number of textures.
        count: usize,
        /// Receives the names.
        on_complete: NamesCallback<TextureId>,
    },
    /// Delete textures.
    DeleteTextures {
        /// Names to delete.
        ids: Vec<TextureId>,
    },
    /// Create one texture.
    GenTexture {
        /// Receives the name.
        on_complete: TextureCallback,
    },
    /// Delete one texture.
    DeleteTexture {
        /// Name to delete.
        id: TextureId,
    },
}

impl RenderCommand {
    /// Sets the raster mode for `face`.
    #[must_use]
    pub fn polygon_mode(face: PolygonFace, mode: PolygonMode) -> Self {
        Self::PolygonMode { face, mode }
    }

    /// Generates `count` buffers and hands them to `on_complete`.
    #[must_use]
    pub fn gen_buffers<F>(count: usize, on_complete: F) -> Self
    where
        F: for<'s> FnOnce(GraphicsResult<&'s [BufferId]>) + Send + 'static,
    {
        Self::GenBuffers {
            count,
            on_complete: Box::new(on_complete),
        }
    }

    /// Deletes `ids`.
    #[must_use]
    pub fn delete_buffers(ids: impl Into<Vec<BufferId>>) -> Self {
        Self::DeleteBuffers { ids: ids.into() }
    }

    /// Generates `count` textures and hands them to `on_complete`.
    #[must_use]
    pub fn gen_textures<F>(count: usize, on_complete: F) -> Self
    where
        F: for<'s> FnOnce(GraphicsResult<&'s [TextureId]>) + Send + 'static,
    {
        Self::GenTextures {
            count,
            on_complete: Box::new(on_complete),
        }
    }

    /// Deletes `ids`.
    #[must_use]
    pub fn delete_textures(ids: impl Into<Vec<TextureId>>) -> Self {
        Self::DeleteTextures { ids: ids.into() }
    }

    /// Generates one texture and hands it to `on_complete`.
    #[must_use]
    pub fn gen_texture<F>(on_complete: F) -> Self
    where
        F: FnOnce(GraphicsResult<TextureId>) + Send + 'static,
    {
        Self::GenTexture {
            on_complete: Box::new(on_complete),
        }
    }

    /// Deletes `id`.
    #[must_use]
    pub fn delete_texture(id: TextureId) -> Self {
        Self::DeleteTexture { id }
    }

    /// Short name of the operation, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PolygonMode { .. } => "polygon_mode",
            Self::GenBuffers { .. } => "gen_buffers",
            Self::DeleteBuffers { .. } => "delete_buffers",
            Self::GenTextures { .. } => "gen_textures",
            Self::DeleteTextures { .. } => "delete_textures",
            Self::GenTexture { .. } => "gen_texture",
            Self::DeleteTexture { .. } => "delete_texture",
        }
    }

    /// Runs the command against `device`.
    ///
    /// Must be called on the thread that owns the graphics context. Name
    /// arrays for generate commands are carved from `scratch` (the frame
    /// arena) and released before this returns. Continuations are invoked
    /// exactly once, with the error if the command failed.
    ///
    /// # Errors
    ///
    /// Returns the device error or the scratch allocation error. The same
    /// error has already been handed to the continuation, if any.
    pub fn execute(self, device: &mut dyn GraphicsDevice, scratch: &dyn Allocator) -> GraphicsResult<()> {
        match self {
            Self::PolygonMode { face, mode } => device.set_polygon_mode(face, mode),
            Self::GenBuffers { count, on_complete } => {
                generate(count, scratch, |ids| device.gen_buffers(ids), on_complete)
            }
            Self::DeleteBuffers { ids } => device.delete_buffers(&ids),
            Self::GenTextures { count, on_complete } => {
                generate(count, scratch, |ids| device.gen_textures(ids), on_complete)
            }
            Self::DeleteTextures { ids } => device.delete_textures(&ids),
            Self::GenTexture { on_complete } => {
                let mut id = [TextureId::NONE];
                let result = device.gen_textures(&mut id);
                on_complete(result.clone().map(|()| id[0]));
                result
            }
            Self::DeleteTexture { id } => device.delete_textures(&[id]),
        }
    }
}

/// Shared body of the multi-name generate commands.
fn generate<H, G>(
    count: usize,
    scratch: &dyn Allocator,
    gen: G,
    on_complete: NamesCallback<H>,
) -> GraphicsResult<()>
where
    H: Zeroable,
    G: FnOnce(&mut [H]) -> GraphicsResult<()>,
{
    let mut ids = match OwnedSlice::<H>::zeroed_in(count, scratch) {
        Ok(ids) => ids,
        Err(err) => {
            let err = GraphicsError::from(err);
            on_complete(Err(err.clone()));
            return Err(err);
        }
    };

    match gen(ids.as_mut_slice()) {
        Ok(()) => {
            on_complete(Ok(ids.as_slice()));
            Ok(())
        }
        Err(err) => {
            on_complete(Err(err.clone()));
            Err(err)
        }
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolygonMode { face, mode } => f
                .debug_struct("PolygonMode")
                .field("face", face)
                .field("mode", mode)
                .finish(),
            Self::GenBuffers { count, .. } => f
                .debug_struct("GenBuffers")
                .field("count", count)
                .finish_non_exhaustive(),
            Self::DeleteBuffers { ids } => f.debug_struct("DeleteBuffers").field("ids", ids).finish(),
            Self::GenTextures { count, .. } => f
                .debug_struct("GenTextures")
                .field("count", count)
                .finish_non_exhaustive(),
            Self::DeleteTextures { ids } => f.debug_struct("DeleteTextures").field("ids", ids).finish(),
            Self::GenTexture { .. } => f.debug_struct("GenTexture").finish_non_exhaustive(),
            Self::DeleteTexture { id } => f.debug_struct("DeleteTexture").field("id", id).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDevice;
    use gled_core::memory::BumpAllocator;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_gen_buffers_invokes_continuation_with_names() {
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::labeled("frame", 1024).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        RenderCommand::gen_buffers(3, move |result| sink.lock().extend_from_slice(result.unwrap()))
            .execute(&mut device, &frame)
            .unwrap();

        assert_eq!(*seen.lock(), vec![BufferId(1), BufferId(2), BufferId(3)]);
        // The scratch names were destroyed, so the frame can be reset.
        assert_eq!(frame.live_objects(), 0);
        assert_eq!(frame.used(), 3 * std::mem::size_of::<BufferId>() + std::mem::align_of::<BufferId>());
        frame.reset().unwrap();
    }

    #[test]
    fn test_device_error_reaches_continuation() {
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(256).unwrap();
        let error = GraphicsError::Device {
            code: 0x0505,
            message: "out of memory".into(),
        };
        device.fail_next(error.clone());

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let result = RenderCommand::gen_texture(move |result| *sink.lock() = Some(result))
            .execute(&mut device, &frame);

        assert_eq!(result, Err(error.clone()));
        assert_eq!(*seen.lock(), Some(Err(error)));
    }

    #[test]
    fn test_scratch_exhaustion_reaches_continuation() {
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::labeled("frame", 8).unwrap();
        let called = Arc::new(Mutex::new(0));

        let sink = Arc::clone(&called);
        let result = RenderCommand::gen_textures(64, move |result| {
            assert!(matches!(result, Err(GraphicsError::Scratch(_))));
            *sink.lock() += 1;
        })
        .execute(&mut device, &frame);

        assert!(matches!(result, Err(GraphicsError::Scratch(_))));
        assert_eq!(*called.lock(), 1);
        assert!(device.live_textures().is_empty());
    }

    #[test]
    fn test_polygon_mode_and_deletes() {
        let mut device = HeadlessDevice::new();
        let frame = BumpAllocator::new(256).unwrap();

        RenderCommand::polygon_mode(PolygonFace::FrontAndBack, PolygonMode::Line)
            .execute(&mut device, &frame)
            .unwrap();
        assert_eq!(device.polygon_mode(PolygonFace::Front), PolygonMode::Line);

        let slot = Arc::new(Mutex::new(TextureId::NONE));
        let sink = Arc::clone(&slot);
        RenderCommand::gen_texture(move |result| *sink.lock() = result.unwrap())
            .execute(&mut device, &frame)
            .unwrap();
        let texture = *slot.lock();
        assert_eq!(device.live_textures(), vec![texture]);

        RenderCommand::delete_texture(texture)
            .execute(&mut device, &frame)
            .unwrap();
        assert!(device.live_textures().is_empty());

        let err = RenderCommand::delete_buffers([BufferId(9)])
            .execute(&mut device, &frame)
            .unwrap_err();
        assert_eq!(err, GraphicsError::UnknownObject { kind: "buffer", id: 9 });
    }

    #[test]
    fn test_debug_and_name() {
        let command = RenderCommand::gen_buffers(2, |_| {});
        assert_eq!(command.name(), "gen_buffers");
        assert_eq!(format!("{command:?}"), "GenBuffers { count: 2, .. }");
    }
}
