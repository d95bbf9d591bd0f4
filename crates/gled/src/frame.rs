//! # Frame Statistics
//!
//! ```text
//! Frame N (render thread):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. START FRAME                                                      │
//! │    └─ Drain the render command queue (live, until empty)            │
//! │                                                                     │
//! │ 2. RENDER                                                           │
//! │    └─ Client code, scratch data in the frame tier                   │
//! │                                                                     │
//! │ 3. FINISH FRAME                                                     │
//! │    ├─ Rate limit to the frame budget                                │
//! │    ├─ Reset the frame tier                                          │
//! │    └─ frame_count += 1                                              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

/// Timing and memory figures for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Time spent draining the command queue, in microseconds.
    pub drain_us: u64,
    /// Start-to-finish frame time (before rate limiting), in microseconds.
    pub total_us: u64,
    /// Commands executed successfully.
    pub commands_executed: usize,
    /// Commands that failed.
    pub commands_failed: usize,
    /// Frame-tier bytes in use just before the reset.
    pub frame_bytes_used: usize,
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Budget a frame is compared against, if any.
    pub budget: Option<Duration>,
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of drain times.
    pub drain_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded the budget.
    pub frames_over_budget: u64,
    /// Commands executed across all frames.
    pub commands_executed: u64,
    /// Commands failed across all frames.
    pub commands_failed: u64,
    /// Peak frame-tier usage.
    pub peak_frame_bytes: usize,
}

impl FrameStatsAccumulator {
    /// Creates an accumulator comparing frames against `budget`.
    #[must_use]
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            budget,
            frames_recorded: 0,
            total_us_sum: 0,
            drain_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            commands_executed: 0,
            commands_failed: 0,
            peak_frame_bytes: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.drain_us_sum += stats.drain_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        self.commands_executed += stats.commands_executed as u64;
        self.commands_failed += stats.commands_failed as u64;
        self.peak_frame_bytes = self.peak_frame_bytes.max(stats.frame_bytes_used);

        if let Some(budget) = self.budget {
            if u128::from(stats.total_us) > budget.as_micros() {
                self.frames_over_budget += 1;
            }
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average FPS implied by the frame times.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary at `info` level.
    #[allow(clippy::cast_precision_loss)]
    pub fn log_summary(&self) {
        if self.frames_recorded == 0 {
            tracing::info!("no frames recorded");
            return;
        }
        tracing::info!(
            frames = self.frames_recorded,
            avg_frame_ms = self.avg_frame_ms(),
            avg_fps = self.avg_fps(),
            min_frame_ms = self.min_frame_us as f64 / 1000.0,
            max_frame_ms = self.max_frame_us as f64 / 1000.0,
            avg_drain_ms = (self.drain_us_sum as f64 / self.frames_recorded as f64) / 1000.0,
            over_budget_pct = self.over_budget_ratio() * 100.0,
            commands_executed = self.commands_executed,
            commands_failed = self.commands_failed,
            peak_frame_bytes = self.peak_frame_bytes,
            "frame statistics"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new(Some(Duration::from_millis(16)));

        for i in 0..100 {
            acc.record(FrameStats {
                frame: i,
                drain_us: 100,
                total_us: 10_000 + (i * 100),
                commands_executed: 2,
                commands_failed: usize::from(i % 10 == 0),
                frame_bytes_used: 256 * (i as usize % 4),
            });
        }

        assert_eq!(acc.frames_recorded, 100);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
        assert_eq!(acc.min_frame_us, 10_000);
        assert_eq!(acc.max_frame_us, 19_900);
        // 16_100 ..= 19_900 are over a 16 ms budget.
        assert_eq!(acc.frames_over_budget, 39);
        assert_eq!(acc.commands_executed, 200);
        assert_eq!(acc.commands_failed, 10);
        assert_eq!(acc.peak_frame_bytes, 768);
        acc.log_summary();
    }

    #[test]
    fn test_unlimited_budget_never_over() {
        let mut acc = FrameStatsAccumulator::default();
        acc.record(FrameStats {
            total_us: 1_000_000,
            ..FrameStats::default()
        });
        assert_eq!(acc.frames_over_budget, 0);
        assert!(acc.over_budget_ratio().abs() < f64::EPSILON);
    }
}
