//! 8-band equalizer
//!
//! Fixed bands at 60 Hz .. 12 kHz: a low shelf, six peaking sections and a
//! high shelf, all at Q = 1. [`EqualizerState`] is the plain data the UI
//! reads and edits; [`EqualizerChain`] is the filter bank running inside an
//! audio graph, rebuilt from the state whenever a new graph is created.

use crate::biquad::{BiquadFilter, FilterKind};
use crate::error::AudioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bands
pub const EQ_BAND_COUNT: usize = 8;

/// Band center frequencies (Hz)
pub const EQ_FREQUENCIES: [f32; EQ_BAND_COUNT] =
    [60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0];

/// Q shared by every band
pub const EQ_Q: f32 = 1.0;

/// Gains are clamped to +/- this many dB
pub const EQ_GAIN_LIMIT_DB: f32 = 12.0;

/// Named gain curves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqPreset {
    /// All bands at 0 dB
    #[default]
    Flat,
    Bass,
    Treble,
    Vocal,
    Rock,
    Pop,
    Jazz,
    Classical,
    /// Bands edited by hand since the last preset
    Custom,
}

impl EqPreset {
    /// Every preset that carries a gain curve
    pub const ALL: [EqPreset; 8] = [
        Self::Flat,
        Self::Bass,
        Self::Treble,
        Self::Vocal,
        Self::Rock,
        Self::Pop,
        Self::Jazz,
        Self::Classical,
    ];

    /// Gain curve in dB, or `None` for `Custom`
    pub fn gains(&self) -> Option<[f32; EQ_BAND_COUNT]> {
        let gains = match self {
            Self::Flat => [0.0; EQ_BAND_COUNT],
            Self::Bass => [6.0, 5.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Self::Treble => [0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 5.0, 6.0],
            Self::Vocal => [-2.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -2.0],
            Self::Rock => [4.0, 3.0, 1.0, 0.0, -1.0, 2.0, 4.0, 5.0],
            Self::Pop => [-1.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0],
            Self::Jazz => [3.0, 2.0, 0.0, 1.0, -1.0, 2.0, 3.0, 4.0],
            Self::Classical => [4.0, 3.0, 2.0, 1.0, 0.0, 1.0, 2.0, 3.0],
            Self::Custom => return None,
        };
        Some(gains)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Bass => "bass",
            Self::Treble => "treble",
            Self::Vocal => "vocal",
            Self::Rock => "rock",
            Self::Pop => "pop",
            Self::Jazz => "jazz",
            Self::Classical => "classical",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for EqPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EqPreset {
    type Err = AudioError;

    /// Case-insensitive; `custom` is a label, not something to apply
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AudioError::UnknownPreset(s.to_string()))
    }
}

/// Filter shape for a band position
pub fn band_kind(index: usize) -> FilterKind {
    match index {
        0 => FilterKind::LowShelf,
        i if i == EQ_BAND_COUNT - 1 => FilterKind::HighShelf,
        _ => FilterKind::Peaking,
    }
}

/// One band as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBandState {
    pub frequency: f32,
    pub gain_db: f32,
    pub kind: FilterKind,
}

/// Current equalizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerState {
    bands: [EqBandState; EQ_BAND_COUNT],
    preset: EqPreset,
}

impl EqualizerState {
    /// Flat response
    pub fn new() -> Self {
        Self {
            bands: std::array::from_fn(|i| EqBandState {
                frequency: EQ_FREQUENCIES[i],
                gain_db: 0.0,
                kind: band_kind(i),
            }),
            preset: EqPreset::Flat,
        }
    }

    pub fn bands(&self) -> &[EqBandState; EQ_BAND_COUNT] {
        &self.bands
    }

    pub fn gains(&self) -> [f32; EQ_BAND_COUNT] {
        std::array::from_fn(|i| self.bands[i].gain_db)
    }

    pub fn preset(&self) -> EqPreset {
        self.preset
    }

    /// Set one band's gain, clamped to the allowed range
    ///
    /// Returns the gain actually stored. Marks the preset label `Custom`.
    pub fn set_gain(&mut self, index: usize, gain_db: f32) -> Option<f32> {
        if !gain_db.is_finite() {
            return None;
        }
        let band = self.bands.get_mut(index)?;
        band.gain_db = gain_db.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB);
        self.preset = EqPreset::Custom;
        Some(band.gain_db)
    }

    /// Overwrite all gains with a preset curve; `Custom` leaves everything as is
    pub fn apply_preset(&mut self, preset: EqPreset) {
        let Some(gains) = preset.gains() else {
            return;
        };
        for (band, gain) in self.bands.iter_mut().zip(gains) {
            band.gain_db = gain;
        }
        self.preset = preset;
    }

    /// Back to flat
    pub fn reset(&mut self) {
        self.apply_preset(EqPreset::Flat);
    }
}

impl Default for EqualizerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The filter bank inside an audio graph
#[derive(Debug, Clone)]
pub struct EqualizerChain {
    filters: [BiquadFilter; EQ_BAND_COUNT],
}

impl EqualizerChain {
    /// Build filters matching `state`, snapped to its gains
    pub fn from_state(state: &EqualizerState, sample_rate: u32) -> Self {
        let bands = state.bands();
        Self {
            filters: std::array::from_fn(|i| {
                BiquadFilter::with_gain(bands[i].kind, bands[i].frequency, EQ_Q, bands[i].gain_db, sample_rate)
            }),
        }
    }

    /// Flat chain
    pub fn flat(sample_rate: u32) -> Self {
        Self::from_state(&EqualizerState::new(), sample_rate)
    }

    /// Live gain change; out-of-range indices are ignored
    pub fn set_gain(&mut self, index: usize, gain_db: f32) {
        if let Some(filter) = self.filters.get_mut(index) {
            filter.set_gain_db(gain_db.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB));
        }
    }

    /// Push every gain in `state` to the running filters
    pub fn sync(&mut self, state: &EqualizerState) {
        for (index, gain) in state.gains().into_iter().enumerate() {
            self.set_gain(index, gain);
        }
    }

    pub fn gains(&self) -> [f32; EQ_BAND_COUNT] {
        std::array::from_fn(|i| self.filters[i].gain_db())
    }

    /// Run the interleaved stereo buffer through all bands in series
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (mut l, mut r) = (frame[0], frame[1]);
            for filter in &mut self.filters {
                (l, r) = filter.process_frame(l, r);
            }
            frame[0] = l;
            frame[1] = r;
        }
    }

    pub fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_layout() {
        let state = EqualizerState::new();
        assert_eq!(state.bands()[0].kind, FilterKind::LowShelf);
        assert_eq!(state.bands()[7].kind, FilterKind::HighShelf);
        assert!(state.bands()[1..7].iter().all(|b| b.kind == FilterKind::Peaking));
        assert_eq!(state.bands()[4].frequency, 1000.0);
    }

    #[test]
    fn test_preset_lookup_is_case_insensitive() {
        assert_eq!("Rock".parse::<EqPreset>().unwrap(), EqPreset::Rock);
        assert_eq!("CLASSICAL".parse::<EqPreset>().unwrap(), EqPreset::Classical);
        assert!("metal".parse::<EqPreset>().is_err());
        assert!("custom".parse::<EqPreset>().is_err());
    }

    #[test]
    fn test_apply_preset_overwrites_all_bands() {
        let mut state = EqualizerState::new();
        state.set_gain(3, 9.0);
        state.apply_preset(EqPreset::Treble);
        assert_eq!(state.gains(), [0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 5.0, 6.0]);
        assert_eq!(state.preset(), EqPreset::Treble);
    }

    #[test]
    fn test_band_edit_marks_custom_and_clamps() {
        let mut state = EqualizerState::new();
        assert_eq!(state.set_gain(0, 40.0), Some(12.0));
        assert_eq!(state.set_gain(1, -40.0), Some(-12.0));
        assert_eq!(state.preset(), EqPreset::Custom);
        assert_eq!(state.set_gain(8, 1.0), None);
        assert_eq!(state.set_gain(2, f32::NAN), None);
    }

    #[test]
    fn test_custom_preset_is_noop() {
        let mut state = EqualizerState::new();
        state.apply_preset(EqPreset::Bass);
        state.apply_preset(EqPreset::Custom);
        assert_eq!(state.preset(), EqPreset::Bass);
    }

    #[test]
    fn test_chain_follows_state() {
        let mut state = EqualizerState::new();
        state.apply_preset(EqPreset::Jazz);
        let mut chain = EqualizerChain::from_state(&state, 44_100);
        assert_eq!(chain.gains(), EqPreset::Jazz.gains().unwrap());

        state.apply_preset(EqPreset::Flat);
        chain.sync(&state);
        assert_eq!(chain.gains(), [0.0; EQ_BAND_COUNT]);
    }

    #[test]
    fn test_flat_chain_passes_signal() {
        let mut chain = EqualizerChain::flat(44_100);
        let input: Vec<f32> = (0..2048).map(|i| ((i as f32) * 0.01).sin() * 0.3).collect();
        let mut output = input.clone();
        chain.process(&mut output);
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
