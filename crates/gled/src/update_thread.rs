//! # Update Thread
//!
//! The long-lived thread that advances simulation while the render thread
//! draws. It may allocate from any tier and push render commands, but never
//! touches the graphics device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::EngineContext;
use crate::error::{EngineError, EngineResult};

/// Name given to the OS thread.
pub const UPDATE_THREAD_NAME: &str = "engine-update";

/// Handle to the running update thread. Dropping it stops and joins it.
///
/// Stopping the thread does not touch the engine-wide quit flag; the loop
/// also ends on its own once quit is requested.
pub struct UpdateThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl UpdateThread {
    /// Starts the thread. `tick` is called repeatedly with the time since the
    /// previous tick until the engine is asked to quit or the handle stops it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ThreadSpawn`] if the OS refuses the thread.
    pub fn spawn<F>(context: Arc<EngineContext>, mut tick: F) -> EngineResult<Self>
    where
        F: FnMut(&EngineContext, Duration) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(UPDATE_THREAD_NAME.into())
            .spawn(move || {
                tracing::debug!("update thread started");
                let mut last_update = Instant::now();
                while !stopped.load(Ordering::Acquire) && !context.should_quit() {
                    let now = Instant::now();
                    tick(&context, now - last_update);
                    last_update = now;
                    thread::yield_now();
                }
                tracing::debug!("update thread stopped");
            })
            .map_err(|source| EngineError::ThreadSpawn {
                name: UPDATE_THREAD_NAME,
                source,
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still running its loop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the loop and waits for the thread to exit.
    pub fn join(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if handle.join().is_err() {
            tracing::warn!("update thread panicked");
        }
    }
}

impl Drop for UpdateThread {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for UpdateThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateThread")
            .field("name", &UPDATE_THREAD_NAME)
            .field("running", &self.is_running())
            .finish()
    }
}
