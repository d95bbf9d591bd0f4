//! # Engine Configuration
//!
//! Loaded once at startup from TOML. Every key is optional:
//!
//! ```toml
//! [memory]
//! system_pool_mb = 50
//! scene_pool_mb = 50
//! frame_pool_mb = 50
//!
//! [video]
//! max_fps = -1      # <= 0 means unlimited, otherwise at least 30
//! sync = false
//!
//! [debug]
//! wireframe = false
//! ```

use std::path::Path;
use std::time::Duration;

use gled_core::memory::TierSizes;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Lowest accepted frame-rate cap.
pub const MIN_MAX_FPS: i32 = 30;

const MB: usize = 1024 * 1024;

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tier sizes.
    pub memory: MemoryConfig,
    /// Frame pacing.
    pub video: VideoConfig,
    /// Debug switches.
    pub debug: DebugConfig,
}

/// Tier sizes in megabytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Budget of the system heap.
    pub system_pool_mb: usize,
    /// Pool of the scene arena.
    pub scene_pool_mb: usize,
    /// Pool of the frame arena.
    pub frame_pool_mb: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            system_pool_mb: 50,
            scene_pool_mb: 50,
            frame_pool_mb: 50,
        }
    }
}

/// Frame pacing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame-rate cap; `<= 0` disables rate limiting.
    pub max_fps: i32,
    /// Wait for vertical sync.
    pub sync: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_fps: -1,
            sync: false,
        }
    }
}

/// Debug switches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Start with wireframe rasterization.
    pub wireframe: bool,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the document does not parse
    /// or fails [`EngineConfig::validate`].
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigIo`] if the file cannot be read, otherwise
    /// see [`EngineConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first bad key.
    pub fn validate(&self) -> EngineResult<()> {
        let pools = [
            ("memory.system_pool_mb", self.memory.system_pool_mb),
            ("memory.scene_pool_mb", self.memory.scene_pool_mb),
            ("memory.frame_pool_mb", self.memory.frame_pool_mb),
        ];
        for (key, mb) in pools {
            if mb == 0 {
                return Err(EngineError::InvalidConfig(format!("{key} must be greater than 0")));
            }
            if mb.checked_mul(MB).is_none() {
                return Err(EngineError::InvalidConfig(format!("{key} is too large")));
            }
        }

        if self.video.max_fps > 0 && self.video.max_fps < MIN_MAX_FPS {
            return Err(EngineError::InvalidConfig(format!(
                "video.max_fps must be at least {MIN_MAX_FPS} (or <= 0 for unlimited)"
            )));
        }
        Ok(())
    }

    /// Tier sizes in bytes.
    #[must_use]
    pub fn tier_sizes(&self) -> TierSizes {
        TierSizes {
            system: self.memory.system_pool_mb.saturating_mul(MB),
            scene: self.memory.scene_pool_mb.saturating_mul(MB),
            frame: self.memory.frame_pool_mb.saturating_mul(MB),
        }
    }

    /// Minimum duration of one frame, or `None` when unlimited.
    #[must_use]
    pub fn frame_budget(&self) -> Option<Duration> {
        u32::try_from(self.video.max_fps)
            .ok()
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_secs(1) / fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.memory.frame_pool_mb, 50);
        assert_eq!(config.video.max_fps, -1);
        assert!(!config.debug.wireframe);
        assert!(config.frame_budget().is_none());
        assert_eq!(config.tier_sizes(), TierSizes::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r"
            [memory]
            frame_pool_mb = 4

            [video]
            max_fps = 60
            ",
        )
        .unwrap();

        assert_eq!(config.memory.frame_pool_mb, 4);
        assert_eq!(config.memory.scene_pool_mb, 50);
        assert_eq!(config.tier_sizes().frame, 4 * MB);
        assert_eq!(config.frame_budget(), Some(Duration::from_secs(1) / 60));
    }

    #[test]
    fn test_max_fps_below_minimum_rejected() {
        let err = EngineConfig::from_toml_str("[video]\nmax_fps = 20\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(msg) if msg.contains("max_fps")));

        EngineConfig::from_toml_str("[video]\nmax_fps = 0\n").unwrap();
        EngineConfig::from_toml_str("[video]\nmax_fps = 30\n").unwrap();
    }

    #[test]
    fn test_zero_pool_rejected() {
        let err = EngineConfig::from_toml_str("[memory]\nscene_pool_mb = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(msg) if msg.contains("scene_pool_mb")));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = EngineConfig::from_toml_str("[video\nmax_fps = ").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/gled.toml").unwrap_err();
        assert!(matches!(err, EngineError::ConfigIo { .. }));
    }
}
