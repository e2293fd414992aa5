//! Error types for playback management

use mood_audio::AudioError;
use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The track's audio could not be fetched or decoded
    #[error("Failed to load track {track_id}: {reason}")]
    LoadFailed { track_id: String, reason: String },

    /// The track's audio did not arrive in time
    #[error("Loading track {track_id} timed out after {timeout:?}")]
    LoadTimedOut { track_id: String, timeout: Duration },

    /// The output refused to start or resume
    #[error("Playback of track {track_id} was rejected: {reason}")]
    PlaybackRejected { track_id: String, reason: String },

    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Equalizer band index out of range, or a non-finite gain
    #[error("Invalid equalizer band: {0}")]
    InvalidEqBand(usize),

    /// No preset with that name
    #[error("Unknown equalizer preset: {0}")]
    UnknownPreset(String),

    /// Lower-level audio failure
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl PlaybackError {
    /// Load failures leave the engine idle rather than erroring a running track
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::LoadFailed { .. } | Self::LoadTimedOut { .. } | Self::PlaybackRejected { .. }
        )
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
