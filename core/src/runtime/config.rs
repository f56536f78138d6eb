//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::save_store::PersistenceConfig;

/// Save file name used when no path is configured
pub const DEFAULT_SAVE_FILE: &str = "pocketpet.sav";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Save slot and autosave cadence
    pub persistence: PersistenceConfig,
    /// Target passes per second for `run`; 0 disables pacing
    pub target_fps: u32,
    /// Initial simulated-time multiplier
    pub time_scale: f32,
    /// Initial display output multiplier
    pub display_scale: u32,
    /// A single pass slower than this is logged
    pub slow_frame_warning: Duration,
}

impl RuntimeConfig {
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        Self {
            persistence: PersistenceConfig::new(save_path),
            target_fps: 60,
            time_scale: 1.0,
            display_scale: 1,
            slow_frame_warning: Duration::from_millis(250),
        }
    }

    /// Wall time one paced pass may take, or `None` when unpaced.
    pub fn frame_budget(&self) -> Option<Duration> {
        match self.target_fps {
            0 => None,
            fps => Some(Duration::from_secs(1) / fps),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_FILE)
    }
}
