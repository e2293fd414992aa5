//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A playable track
///
/// Two tracks are the same track when their ids match, regardless of any
/// other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier
    pub id: String,

    pub title: String,

    pub artist: String,

    /// Where the audio lives: an http(s) URL, `file://` URL or local path
    pub source_url: String,

    /// Mood tag the track was picked for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,

    /// Time-synced lyrics in LRC form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            source_url: source_url.into(),
            mood: None,
            lyrics: None,
        }
    }

    #[must_use]
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    #[must_use]
    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    /// Same identity as `other`
    pub fn same_as(&self, other: &Track) -> bool {
        self.id == other.id
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No track loaded
    #[default]
    Idle,

    /// Waiting for the current track's audio to arrive
    Loading,

    /// Audio is audible
    Playing,

    /// Paused mid-track
    Paused,

    /// The last track finished and nothing followed it
    Ended,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queue runs out
    #[default]
    Off,

    /// Loop the whole session's set of tracks
    All,

    /// Loop the current track
    One,
}

impl RepeatMode {
    /// Off -> All -> One -> Off
    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::All => "all",
            Self::One => "one",
        })
    }
}

impl FromStr for RepeatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "all" | "queue" => Ok(Self::All),
            "one" | "track" => Ok(Self::One),
            other => Err(format!("unknown repeat mode '{other}'")),
        }
    }
}

/// What is playing right now, as the UI sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub current_track: Option<Track>,
    pub state: PlaybackState,
    /// Seconds from the start of the track
    pub position_secs: f64,
    /// Zero until the track's audio is available
    pub duration_secs: f64,
    /// Output gain in [0, 1]
    pub volume: f32,
    /// Speed multiplier in [0.5, 2.0]
    pub playback_rate: f32,
    /// Why the last load or resume failed; cleared by the next load
    pub last_error: Option<String>,
}

impl PlaybackSession {
    pub fn new(volume: f32, playback_rate: f32) -> Self {
        Self {
            current_track: None,
            state: PlaybackState::Idle,
            position_secs: 0.0,
            duration_secs: 0.0,
            volume,
            playback_rate,
            last_error: None,
        }
    }

    /// True only while audio is audible
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position as a fraction of duration, 0 when the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_VOLUME, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_identity_is_id() {
        let a = Track::new("t1", "Title", "Artist", "https://x/a.mp3");
        let b = Track::new("t1", "Other", "Someone", "https://x/b.mp3").with_mood("calm");
        assert!(a.same_as(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_repeat_cycle_and_parse() {
        assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::Off);
        assert_eq!("ALL".parse::<RepeatMode>().unwrap(), RepeatMode::All);
        assert!("sometimes".parse::<RepeatMode>().is_err());
    }

    #[test]
    fn test_session_progress() {
        let mut session = PlaybackSession::default();
        assert_eq!(session.progress(), 0.0);
        session.duration_secs = 200.0;
        session.position_secs = 50.0;
        assert_eq!(session.progress(), 0.25);
        assert!(!session.is_playing());
    }

    #[test]
    fn test_track_json_skips_empty_extras() {
        let json = serde_json::to_string(&Track::new("a", "b", "c", "d")).unwrap();
        assert!(!json.contains("lyrics"));
        let back: Track = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "a");
    }
}
