//! Playback Events
//!
//! Event-based communication for UI synchronization. Events are queued by
//! the engine and drained by the host; the latest full state is also
//! published as a [`PlayerSnapshot`] on a watch channel.

use crate::types::{PlaybackSession, PlaybackState, RepeatMode, Track};
use mood_audio::EqualizerState;
use serde::{Deserialize, Serialize};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged { state: PlaybackState },

    /// A new track became current
    TrackChanged {
        track_id: String,
        previous_track_id: Option<String>,
    },

    /// Track played to its end
    TrackFinished { track_id: String },

    /// Track audio could not be loaded; the engine is idle again
    LoadFailed {
        track_id: String,
        message: String,
        timed_out: bool,
    },

    /// The output refused to start or resume
    PlaybackRejected { track_id: String, message: String },

    /// Periodic position update
    PositionUpdate { position_ms: u64, duration_ms: u64 },

    /// Volume changed
    VolumeChanged { volume: f32 },

    /// Speed changed
    PlaybackRateChanged { rate: f32 },

    /// Queue contents changed
    QueueChanged { length: usize },

    /// Fade-out of the current track began
    CrossfadeStarted { track_id: String, duration_secs: u32 },

    /// Fade-out reached silence
    CrossfadeCompleted,

    /// Sleep timer armed (`Some`) or cancelled (`None`)
    SleepTimerChanged { minutes: Option<u32> },

    /// Sleep timer expired and paused playback
    SleepTimerFired,

    /// Equalizer gains changed
    EqualizerChanged { gains: [f32; mood_audio::EQ_BAND_COUNT] },

    /// Visualizer fell back to simulated bars
    VisualizerFallback { reason: String },
}

/// Sleep timer as shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepTimerStatus {
    pub total_secs: u32,
    pub remaining_secs: u32,
}

/// Everything a UI needs to render the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub session: PlaybackSession,
    pub queue: Vec<Track>,
    pub history: Vec<Track>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub crossfade_secs: u32,
    pub crossfade_active: bool,
    pub sleep_timer: Option<SleepTimerStatus>,
    pub equalizer: EqualizerState,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            session: PlaybackSession::default(),
            queue: Vec::new(),
            history: Vec::new(),
            shuffle: false,
            repeat: RepeatMode::Off,
            crossfade_secs: 0,
            crossfade_active: false,
            sleep_timer: None,
            equalizer: EqualizerState::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PlaybackEvent::TrackChanged {
            track_id: "track1".to_string(),
            previous_track_id: Some("track0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"track_changed""#));

        let deserialized: PlaybackEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&PlaybackEvent::StateChanged {
            state: PlaybackState::Playing,
        })
        .unwrap();
        assert!(json.contains(r#""state":"playing""#));
    }
}
