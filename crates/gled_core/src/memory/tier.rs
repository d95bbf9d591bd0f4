//! # Lifetime Tiers
//!
//! The three allocators every engine object is born into.
//!
//! ```text
//!   System ── HeapAllocator ── engine start ............... process exit
//!   Scene  ── BumpAllocator ── begin_scene ........ unload_scene (reset)
//!   Frame  ── BumpAllocator ── start_frame ... finish_frame (reset)
//! ```
//!
//! An object picks its tier when it is constructed and keeps it for life.
//! Everything allocated from a tier must be destroyed before that tier is
//! reset; the allocators refuse a reset while owned objects are live.

use std::fmt;

use crate::error::MemoryResult;

use super::allocator::{Allocator, AllocatorKind, AllocatorStats};
use super::bump::BumpAllocator;
use super::heap::HeapAllocator;

const MB: usize = 1024 * 1024;

/// Which allocator an object lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeTier {
    /// Process lifetime.
    System,
    /// One loaded scene.
    Scene,
    /// One rendered frame.
    Frame,
}

impl LifetimeTier {
    /// All tiers, longest-lived first.
    pub const ALL: [Self; 3] = [Self::System, Self::Scene, Self::Frame];

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Scene => "scene",
            Self::Frame => "frame",
        }
    }
}

impl fmt::Display for LifetimeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capacity of each tier in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierSizes {
    /// Budget of the system heap.
    pub system: usize,
    /// Pool size of the scene arena.
    pub scene: usize,
    /// Pool size of the frame arena.
    pub frame: usize,
}

impl Default for TierSizes {
    fn default() -> Self {
        Self {
            system: 50 * MB,
            scene: 50 * MB,
            frame: 50 * MB,
        }
    }
}

/// The System, Scene and Frame allocators.
#[derive(Debug)]
pub struct MemoryTiers {
    system: HeapAllocator,
    scene: BumpAllocator,
    frame: BumpAllocator,
}

impl MemoryTiers {
    /// Builds all three tiers.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MemoryError::PoolUnavailable`] if an arena pool cannot
    /// be reserved.
    pub fn new(sizes: TierSizes) -> MemoryResult<Self> {
        let tiers = Self {
            system: HeapAllocator::labeled(LifetimeTier::System.name(), sizes.system),
            scene: BumpAllocator::labeled(LifetimeTier::Scene.name(), sizes.scene)?,
            frame: BumpAllocator::labeled(LifetimeTier::Frame.name(), sizes.frame)?,
        };
        tracing::info!(
            system = sizes.system,
            scene = sizes.scene,
            frame = sizes.frame,
            "memory tiers ready"
        );
        Ok(tiers)
    }

    /// Process-lifetime allocator.
    #[inline]
    #[must_use]
    pub fn system(&self) -> &HeapAllocator {
        &self.system
    }

    /// Allocator of the currently loaded scene.
    #[inline]
    #[must_use]
    pub fn scene(&self) -> &BumpAllocator {
        &self.scene
    }

    /// Scratch allocator for the current frame.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> &BumpAllocator {
        &self.frame
    }

    /// The allocator backing `tier`.
    #[must_use]
    pub fn allocator(&self, tier: LifetimeTier) -> &dyn Allocator {
        match tier {
            LifetimeTier::System => &self.system,
            LifetimeTier::Scene => &self.scene,
            LifetimeTier::Frame => &self.frame,
        }
    }

    /// Resets `tier`, ending the lifetime of everything allocated from it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MemoryError::LiveObjects`] if objects owned by the tier
    /// are still alive; the tier is left untouched.
    pub fn reset(&self, tier: LifetimeTier) -> MemoryResult<()> {
        self.allocator(tier).reset().map_err(|err| {
            tracing::warn!(%tier, error = %err, "tier reset refused");
            err
        })
    }

    /// Snapshot of every tier's usage.
    #[must_use]
    pub fn report(&self) -> MemoryReport {
        MemoryReport {
            tiers: LifetimeTier::ALL.map(|tier| {
                let allocator = self.allocator(tier);
                TierReport {
                    tier,
                    kind: allocator.kind(),
                    stats: allocator.stats(),
                }
            }),
        }
    }

    /// Logs the usage report at `info` level, one line per tier.
    pub fn log_details(&self) {
        for entry in &self.report().tiers {
            tracing::info!(
                tier = %entry.tier,
                kind = %entry.kind,
                total_mb = to_mb(entry.stats.total),
                used_mb = to_mb(entry.stats.used),
                used_pct = entry.stats.used_ratio() * 100.0,
                available_mb = to_mb(entry.stats.unused()),
                allocations = entry.stats.allocation_count,
                allocation_bytes = entry.stats.allocation_bytes,
                live_objects = entry.stats.live_objects,
                "memory details"
            );
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_mb(bytes: usize) -> f64 {
    bytes as f64 / MB as f64
}

/// Usage of one tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierReport {
    /// Which tier.
    pub tier: LifetimeTier,
    /// Backing allocator variant.
    pub kind: AllocatorKind,
    /// Usage figures.
    pub stats: AllocatorStats,
}

/// Usage of every tier, longest-lived first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryReport {
    /// One entry per tier, in [`LifetimeTier::ALL`] order.
    pub tiers: [TierReport; 3],
}

impl MemoryReport {
    /// The entry for `tier`.
    #[must_use]
    pub fn tier(&self, tier: LifetimeTier) -> &TierReport {
        match tier {
            LifetimeTier::System => &self.tiers[0],
            LifetimeTier::Scene => &self.tiers[1],
            LifetimeTier::Frame => &self.tiers[2],
        }
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.tiers {
            let stats = &entry.stats;
            writeln!(
                f,
                "{:<6} ({}): {:.2}/{:.2} MB used ({:.1}%), {} allocations, {} bytes, {} live",
                entry.tier.name(),
                entry.kind,
                to_mb(stats.used),
                to_mb(stats.total),
                stats.used_ratio() * 100.0,
                stats.allocation_count,
                stats.allocation_bytes,
                stats.live_objects,
            )?;
        }
        Ok(())
    }
}
