//! Mood Player Audio
//!
//! The signal path behind every playing track:
//!
//! ```text
//! source -> 8-band EQ -> analyser tap -> gain -> output device
//! ```
//!
//! This crate provides:
//! - Track loading from URLs or file paths, decoded via Symphonia and
//!   resampled to the graph rate with rubato
//! - An 8-band biquad equalizer with named presets
//! - A frequency analyser tap (2048-point FFT) for visualizers
//! - A cpal output thread (behind the `desktop` feature)
//!
//! # Example: Building a graph
//!
//! ```rust
//! use mood_audio::{EqPreset, EqualizerState, GraphBuilder, MemorySource};
//! use std::time::Duration;
//!
//! let mut eq = EqualizerState::new();
//! eq.apply_preset(EqPreset::Rock);
//!
//! let source = MemorySource::silent(Duration::from_secs(2), 44_100);
//! let mut graph = GraphBuilder::new(44_100)
//!     .equalizer(&eq)
//!     .gain(0.7)
//!     .with_analyser(true)
//!     .build(Box::new(source));
//!
//! let mut block = vec![0.0; 1024];
//! graph.render(&mut block);
//! assert!(graph.position() > Duration::ZERO);
//! ```

pub mod analyser;
pub mod biquad;
mod decoder;
pub mod equalizer;
mod error;
mod fetch;
pub mod graph;
mod loader;
#[cfg(feature = "desktop")]
pub mod output;
mod resample;
pub mod source;

pub use analyser::{downsample_bins, AnalyserTap, FFT_SIZE};
pub use biquad::{BiquadFilter, FilterKind};
pub use decoder::{decode_bytes, DecodedAudio};
pub use equalizer::{
    EqBandState, EqPreset, EqualizerChain, EqualizerState, EQ_BAND_COUNT, EQ_FREQUENCIES,
    EQ_GAIN_LIMIT_DB, EQ_Q,
};
pub use error::{AudioError, Result};
pub use fetch::{extension_hint, fetch_source};
pub use graph::{AudioGraph, GraphBuilder, SharedGraph};
pub use loader::SymphoniaLoader;
#[cfg(feature = "desktop")]
pub use output::{AttachmentId, CpalOutput};
pub use resample::resample_stereo;
pub use source::{AudioSource, MemorySource};
