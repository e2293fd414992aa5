//! Mood Player - Playback Engine
//!
//! Client-side playback for mood-driven listening sessions.
//!
//! This crate provides:
//! - A playback engine that plays one track at a time (latest request wins)
//! - Queue with history, shuffle and repeat (Off, All, One)
//! - Crossfade fade-out over the last seconds of a track
//! - 8-band equalizer control with named presets
//! - Visualizer bars from the graph's analyser tap
//! - Sleep timer, synced lyrics and text commands for terminal hosts
//!
//! # Architecture
//!
//! The engine never touches devices or the network itself. Platform code
//! implements [`AudioBackend`] (load a URL, open an output); the `desktop`
//! feature supplies one built on Symphonia and cpal.
//!
//! # Example: Queue
//!
//! ```rust
//! use mood_playback::{QueueManager, RepeatMode, Track, EndOfTrack};
//!
//! let mut queue = QueueManager::with_seed(7);
//! queue.enqueue(Track::new("1", "Rain", "Artist", "file:///music/rain.mp3"));
//! queue.enqueue(Track::new("2", "Dusk", "Artist", "file:///music/dusk.mp3"));
//! queue.set_repeat(RepeatMode::All);
//!
//! let first = queue.dequeue_next().unwrap();
//! assert_eq!(first.id, "1");
//! assert!(matches!(queue.on_track_end(Some(&first)), EndOfTrack::Advance(_)));
//! ```
//!
//! # Example: Engine
//!
//! ```rust,no_run
//! use mood_playback::{PlaybackConfig, PlaybackEngine, Track};
//! # use mood_playback::{AudioBackend, OutputHandle};
//! # use mood_audio::{AudioSource, MemorySource, SharedGraph};
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # struct Silent;
//! # struct Handle;
//! # impl OutputHandle for Handle {
//! #     fn pause(&mut self) {}
//! #     fn resume(&mut self) -> mood_audio::Result<()> { Ok(()) }
//! #     fn detach(&mut self) {}
//! # }
//! # #[async_trait::async_trait]
//! # impl AudioBackend for Silent {
//! #     async fn load(&self, _url: &str) -> mood_audio::Result<Box<dyn AudioSource>> {
//! #         Ok(Box::new(MemorySource::silent(Duration::from_secs(30), 8_000)))
//! #     }
//! #     fn open_output(&self, _graph: SharedGraph) -> mood_audio::Result<Box<dyn OutputHandle>> {
//! #         Ok(Box::new(Handle))
//! #     }
//! #     fn sample_rate(&self) -> u32 { 8_000 }
//! # }
//! # async fn demo() {
//! let engine = PlaybackEngine::new(Arc::new(Silent), PlaybackConfig::default());
//! engine.start_clock();
//!
//! let outcome = engine
//!     .play(Track::new("1", "Rain", "Artist", "https://cdn.example.com/rain.mp3"))
//!     .outcome()
//!     .await;
//! assert!(outcome.is_started());
//!
//! engine.set_volume(0.5);
//! engine.apply_eq_preset("jazz").unwrap();
//! let mut snapshots = engine.subscribe();
//! snapshots.changed().await.ok();
//! # }
//! ```

pub mod backend;
mod config;
pub mod control;
mod crossfade;
mod engine;
mod equalizer;
mod error;
mod events;
mod history;
pub mod lyrics;
mod queue;
mod shuffle;
mod sleep;
pub mod types;
pub mod visualizer;

// Public exports
pub use backend::{AudioBackend, OutputHandle};
#[cfg(feature = "desktop")]
pub use backend::DesktopBackend;
pub use config::{
    clamp_rate, clamp_volume, PlaybackConfig, DEFAULT_VOLUME, MAX_CROSSFADE_SECS,
    MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE,
};
pub use control::{next_speed, PlayerCommand, PLAYBACK_SPEEDS};
pub use crossfade::{CrossfadeController, FadeStep};
pub use engine::{LoadOutcome, PlayRequest, PlaybackEngine};
pub use equalizer::EqualizerController;
pub use error::{PlaybackError, Result};
pub use events::{PlaybackEvent, PlayerSnapshot, SleepTimerStatus};
pub use history::History;
pub use lyrics::{LyricLine, SyncedLyrics};
pub use queue::{EndOfTrack, QueueManager};
pub use sleep::SleepTimer;
pub use types::{PlaybackSession, PlaybackState, RepeatMode, Track};
pub use visualizer::{AnalyzerMode, FrequencyAnalyzer, IDLE_BAR_LEVEL};

pub use mood_audio::{EqPreset, EqualizerState};
