//! Engine configuration

use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_VOLUME: f32 = 0.7;
pub const MIN_PLAYBACK_RATE: f32 = 0.5;
pub const MAX_PLAYBACK_RATE: f32 = 2.0;
pub const MAX_CROSSFADE_SECS: u32 = 12;

/// Configuration for the playback engine
///
/// Every field has a default, so a partial config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume in [0, 1] (default: 0.7)
    pub volume: f32,

    /// Initial speed multiplier (default: 1.0)
    pub playback_rate: f32,

    /// Crossfade window in seconds, 0 disables (default: 0)
    pub crossfade_secs: u32,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle state (default: false)
    pub shuffle: bool,

    /// Give up on a track load after this long (default: 10s)
    pub load_timeout_ms: u64,

    /// Position/crossfade tick period (default: 100ms)
    pub tick_interval_ms: u64,

    /// Visualizer bar count (default: 20)
    pub visualizer_bars: usize,

    /// Visualizer frames per second (default: 15)
    pub visualizer_fps: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            playback_rate: 1.0,
            crossfade_secs: 0,
            repeat: RepeatMode::Off,
            shuffle: false,
            load_timeout_ms: 10_000,
            tick_interval_ms: 100,
            visualizer_bars: 20,
            visualizer_fps: 15,
        }
    }
}

impl PlaybackConfig {
    /// Copy with every field pulled into its valid range
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.volume = clamp_volume(self.volume).unwrap_or(DEFAULT_VOLUME);
        self.playback_rate = clamp_rate(self.playback_rate).unwrap_or(1.0);
        self.crossfade_secs = self.crossfade_secs.min(MAX_CROSSFADE_SECS);
        self.load_timeout_ms = self.load_timeout_ms.max(1);
        self.tick_interval_ms = self.tick_interval_ms.max(10);
        self.visualizer_bars = self.visualizer_bars.max(1);
        self.visualizer_fps = self.visualizer_fps.clamp(1, 60);
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn visualizer_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.visualizer_fps.max(1)))
    }
}

/// Clamp to [0, 1]; `None` for NaN or infinities
pub fn clamp_volume(volume: f32) -> Option<f32> {
    volume.is_finite().then(|| volume.clamp(0.0, 1.0))
}

/// Clamp to [0.5, 2.0]; `None` for NaN or infinities
pub fn clamp_rate(rate: f32) -> Option<f32> {
    rate.is_finite()
        .then(|| rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE))
}
