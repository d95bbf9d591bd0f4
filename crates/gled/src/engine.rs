//! # Engine
//!
//! The explicit engine context and the render-thread frame lifecycle.
//!
//! ```text
//!            Arc<EngineContext>  (Sync, shared with every thread)
//!            ├─ MemoryTiers { system, scene, frame }
//!            ├─ RenderCommandSender
//!            └─ quit flag, frame count, current scene
//!                     ▲
//!   ┌─────────────────┴─────────────────┐
//!   │ Engine<D>  (render thread only)    │
//!   │  ├─ RenderCommandQueue  (!Send)    │
//!   │  ├─ D: GraphicsDevice              │
//!   │  └─ UpdateThread                   │
//!   └────────────────────────────────────┘
//! ```
//!
//! Objects borrow the allocator they live in, so keep a clone of the
//! context `Arc` around for allocations instead of borrowing through the
//! engine:
//!
//! ```rust
//! use std::sync::Arc;
//! use gled::{Engine, EngineConfig};
//! use gled_core::memory::OwnedSlice;
//! use gled_rendering::HeadlessDevice;
//!
//! let config = EngineConfig::from_toml_str("[memory]\nframe_pool_mb = 1").unwrap();
//! let mut engine = Engine::init(config, HeadlessDevice::new()).unwrap();
//! let context = Arc::clone(engine.context());
//!
//! engine.start_frame();
//! {
//!     let scratch = OwnedSlice::<f32>::zeroed_in(64, context.frame_allocator()).unwrap();
//!     assert_eq!(scratch.len(), 64);
//! }
//! engine.finish_frame(false).unwrap();
//! assert_eq!(context.frame_count(), 1);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use gled_core::memory::{BumpAllocator, HeapAllocator, LifetimeTier, MemoryTiers};
use gled_core::Allocator;
use gled_rendering::{
    DrainStats, GraphicsDevice, PolygonFace, PolygonMode, RenderCommand, RenderCommandQueue,
    RenderCommandSender,
};
use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::frame::{FrameStats, FrameStatsAccumulator};
use crate::update_thread::UpdateThread;

// ============================================================================
// EngineContext
// ============================================================================

/// Engine state shared by the render thread, the update thread and loaders.
pub struct EngineContext {
    tiers: MemoryTiers,
    commands: RenderCommandSender,
    quit: AtomicBool,
    frame_count: AtomicU64,
    start_time: Instant,
    scene: Mutex<Option<String>>,
}

impl EngineContext {
    /// All three tiers.
    #[inline]
    #[must_use]
    pub fn tiers(&self) -> &MemoryTiers {
        &self.tiers
    }

    /// Process-lifetime allocator.
    #[inline]
    #[must_use]
    pub fn system_allocator(&self) -> &HeapAllocator {
        self.tiers.system()
    }

    /// Allocator of the current scene.
    #[inline]
    #[must_use]
    pub fn scene_allocator(&self) -> &BumpAllocator {
        self.tiers.scene()
    }

    /// Scratch allocator for the current frame.
    #[inline]
    #[must_use]
    pub fn frame_allocator(&self) -> &BumpAllocator {
        self.tiers.frame()
    }

    /// Producer handle for the render command queue.
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &RenderCommandSender {
        &self.commands
    }

    /// Queues a command for the render thread.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Graphics`] if the engine has shut down.
    pub fn push_command(&self, command: RenderCommand) -> EngineResult<()> {
        self.commands.push(command)?;
        Ok(())
    }

    /// Switches between wireframe and filled rasterization.
    ///
    /// # Errors
    ///
    /// See [`EngineContext::push_command`].
    pub fn set_wireframe(&self, enabled: bool) -> EngineResult<()> {
        let mode = if enabled {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        };
        tracing::debug!(enabled, "wireframe toggled");
        self.push_command(RenderCommand::polygon_mode(PolygonFace::FrontAndBack, mode))
    }

    /// Starts a new scene lifetime, unloading the current scene first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Memory`] if the previous scene still has
    /// live objects; the previous scene stays current.
    pub fn begin_scene(&self, name: &str) -> EngineResult<()> {
        let mut scene = self.scene.lock();
        if let Some(previous) = scene.as_deref() {
            self.tiers.reset(LifetimeTier::Scene)?;
            tracing::info!(scene = previous, "scene unloaded");
        }
        *scene = Some(name.to_owned());
        tracing::info!(scene = name, "scene loading");
        Ok(())
    }

    /// Ends the current scene lifetime, resetting the scene tier.
    ///
    /// Every object allocated from the scene tier must already be dropped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Memory`] if scene objects are still
    /// alive; the scene stays loaded.
    pub fn unload_scene(&self) -> EngineResult<()> {
        let mut scene = self.scene.lock();
        let Some(name) = scene.as_deref() else {
            return Ok(());
        };
        self.tiers.reset(LifetimeTier::Scene)?;
        tracing::info!(scene = name, "scene unloaded");
        *scene = None;
        Ok(())
    }

    /// Name of the loaded scene.
    #[must_use]
    pub fn current_scene(&self) -> Option<String> {
        self.scene.lock().clone()
    }

    /// Asks every engine loop to stop.
    pub fn quit(&self) {
        self.quit.store(true, Ordering::Release);
    }

    /// Whether quit was requested.
    #[inline]
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Frames finished so far.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }

    /// Time since the engine started.
    #[must_use]
    pub fn runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Frames finished per second of runtime.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f64 {
        let runtime = self.runtime().as_secs_f64();
        if runtime <= 0.0 {
            return 0.0;
        }
        self.frame_count() as f64 / runtime
    }

    /// Logs per-tier memory usage.
    pub fn log_memory_details(&self) {
        self.tiers.log_details();
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("frame_count", &self.frame_count())
            .field("scene", &self.current_scene())
            .field("quit", &self.should_quit())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The render-thread side of the engine.
///
/// Owns the graphics device and the consuming end of the command queue, so
/// it is not `Send`: create it on the thread that owns the graphics context.
pub struct Engine<D: GraphicsDevice> {
    context: Arc<EngineContext>,
    queue: RenderCommandQueue,
    device: D,
    config: EngineConfig,
    update_thread: Option<UpdateThread>,
    stats: FrameStatsAccumulator,
    frame_start: Instant,
    last_drain: DrainStats,
    last_drain_us: u64,
}

impl<D: GraphicsDevice> Engine<D> {
    /// Validates `config`, builds the tiers and the command queue.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidConfig`] for a bad configuration
    /// or [`crate::EngineError::Memory`] if a tier cannot be created.
    pub fn init(config: EngineConfig, device: D) -> EngineResult<Self> {
        config.validate()?;
        let tiers = MemoryTiers::new(config.tier_sizes())?;
        let queue = RenderCommandQueue::new();

        let context = Arc::new(EngineContext {
            tiers,
            commands: queue.sender(),
            quit: AtomicBool::new(false),
            frame_count: AtomicU64::new(0),
            start_time: Instant::now(),
            scene: Mutex::new(None),
        });

        if config.debug.wireframe {
            context.set_wireframe(true)?;
        }

        tracing::info!(max_fps = config.video.max_fps, "engine initialized");
        context.log_memory_details();

        Ok(Self {
            context,
            queue,
            device,
            stats: FrameStatsAccumulator::new(config.frame_budget()),
            config,
            update_thread: None,
            frame_start: Instant::now(),
            last_drain: DrainStats::default(),
            last_drain_us: 0,
        })
    }

    /// The shared context. Clone the `Arc` to hand it to other threads.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// The configuration the engine was started with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The graphics device.
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The graphics device, mutably. Render thread only, like every device call.
    #[must_use]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The consuming end of the command queue.
    #[must_use]
    pub fn queue(&self) -> &RenderCommandQueue {
        &self.queue
    }

    /// Accumulated frame statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats
    }

    /// Begins a frame: executes every pending render command.
    ///
    /// The drain is live, so commands pushed by other threads while it runs
    /// may execute in this frame too.
    pub fn start_frame(&mut self) -> DrainStats {
        self.frame_start = Instant::now();
        let drain = self
            .queue
            .drain(&mut self.device, self.context.tiers.frame());

        self.last_drain = drain;
        self.last_drain_us = duration_us(self.frame_start.elapsed());
        drain
    }

    /// Ends a frame: optionally sleeps out the frame budget, then resets the
    /// frame tier and advances the frame count.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::Memory`] if frame-tier objects are still
    /// alive. The frame is not counted; drop them and call again.
    pub fn finish_frame(&mut self, rate_limit: bool) -> EngineResult<FrameStats> {
        let elapsed = self.frame_start.elapsed();
        if rate_limit {
            self.rate_limit(elapsed);
        }

        let frame_bytes_used = self.context.tiers.frame().used();
        self.context.tiers.reset(LifetimeTier::Frame)?;
        let frame = self.context.frame_count.fetch_add(1, Ordering::AcqRel);

        let stats = FrameStats {
            frame,
            drain_us: self.last_drain_us,
            total_us: duration_us(elapsed),
            commands_executed: self.last_drain.executed,
            commands_failed: self.last_drain.failed,
            frame_bytes_used,
        };
        self.stats.record(stats);
        self.last_drain = DrainStats::default();
        self.last_drain_us = 0;

        tracing::trace!(frame, total_us = stats.total_us, "frame finished");
        Ok(stats)
    }

    fn rate_limit(&self, elapsed: Duration) {
        if let Some(budget) = self.config.frame_budget() {
            if elapsed < budget {
                thread::sleep(budget - elapsed);
            }
        }
    }

    /// Time since the current frame started.
    #[must_use]
    pub fn frame_time(&self) -> Duration {
        self.frame_start.elapsed()
    }

    /// Frame rate implied by the current frame's time so far.
    #[must_use]
    pub fn current_fps(&self) -> f64 {
        let seconds = self.frame_time().as_secs_f64();
        if seconds <= 0.0 {
            return 0.0;
        }
        1.0 / seconds
    }

    /// Starts the update thread with `tick`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::ThreadSpawn`] if the thread cannot start.
    pub fn spawn_update_thread<F>(&mut self, tick: F) -> EngineResult<()>
    where
        F: FnMut(&EngineContext, Duration) + Send + 'static,
    {
        if let Some(previous) = self.update_thread.take() {
            tracing::warn!("update thread restarted");
            previous.join();
        }
        self.update_thread = Some(UpdateThread::spawn(Arc::clone(&self.context), tick)?);
        Ok(())
    }

    /// Stops the engine and hands the device back.
    ///
    /// Joins the update thread, then drains outstanding commands so deletes
    /// still reach the device, unloads the scene and logs runtime figures.
    pub fn shutdown(mut self) -> D {
        self.context.quit();
        if let Some(update_thread) = self.update_thread.take() {
            update_thread.join();
        }

        let drain = self
            .queue
            .drain(&mut self.device, self.context.tiers.frame());
        if let Err(err) = self.context.tiers.reset(LifetimeTier::Frame) {
            tracing::warn!(error = %err, "frame tier still in use at shutdown");
        }
        if let Err(err) = self.context.unload_scene() {
            tracing::warn!(error = %err, "scene still in use at shutdown");
        }

        tracing::info!(
            frames = self.context.frame_count(),
            runtime_s = self.context.runtime().as_secs_f64(),
            average_fps = self.context.average_fps(),
            final_commands = drain.total(),
            "engine shut down"
        );
        self.stats.log_summary();
        self.context.log_memory_details();

        self.device
    }
}

impl<D: GraphicsDevice + std::fmt::Debug> std::fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("context", &self.context)
            .field("queue", &self.queue)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
