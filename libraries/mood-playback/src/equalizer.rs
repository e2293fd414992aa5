//! Equalizer control
//!
//! Holds the session's [`EqualizerState`] and a weak handle to the live
//! graph. Gain changes are applied in place to the running filters; the
//! chain is only rebuilt when a new graph is built for a new track.

use crate::error::{PlaybackError, Result};
use mood_audio::{AudioGraph, EqPreset, EqualizerState, SharedGraph, EQ_BAND_COUNT};
use std::sync::{Mutex, Weak};

#[derive(Debug, Default)]
pub struct EqualizerController {
    state: EqualizerState,
    graph: Option<Weak<Mutex<AudioGraph>>>,
}

impl EqualizerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EqualizerState {
        &self.state
    }

    pub fn gains(&self) -> [f32; EQ_BAND_COUNT] {
        self.state.gains()
    }

    pub fn preset(&self) -> EqPreset {
        self.state.preset()
    }

    /// Follow a newly built graph and make sure it matches current settings
    pub fn attach(&mut self, graph: &SharedGraph) {
        self.graph = Some(std::sync::Arc::downgrade(graph));
        self.sync_live();
    }

    pub fn detach(&mut self) {
        self.graph = None;
    }

    pub fn is_attached(&self) -> bool {
        self.graph.as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Clamp and apply one band; returns the stored gain
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) -> Result<f32> {
        let gain = self
            .state
            .set_gain(index, gain_db)
            .ok_or(PlaybackError::InvalidEqBand(index))?;
        self.with_live(|graph| graph.equalizer_mut().set_gain(index, gain));
        Ok(gain)
    }

    /// Apply a preset by name (case-insensitive)
    pub fn apply_preset_name(&mut self, name: &str) -> Result<EqPreset> {
        let preset: EqPreset = name
            .parse()
            .map_err(|_| PlaybackError::UnknownPreset(name.to_string()))?;
        self.apply_preset(preset);
        Ok(preset)
    }

    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.state.apply_preset(preset);
        self.sync_live();
    }

    pub fn reset(&mut self) {
        self.apply_preset(EqPreset::Flat);
    }

    fn sync_live(&mut self) {
        let state = self.state.clone();
        self.with_live(|graph| graph.equalizer_mut().sync(&state));
    }

    /// Run `f` on the live graph if it still exists; a dead graph is forgotten
    fn with_live(&mut self, f: impl FnOnce(&mut AudioGraph)) {
        let Some(graph) = self.graph.as_ref().and_then(Weak::upgrade) else {
            self.graph = None;
            return;
        };
        let mut guard = graph.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard);
    }
}
