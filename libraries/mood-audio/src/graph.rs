//! Per-track audio graph
//!
//! One graph exists per output instance:
//!
//! ```text
//! source -> EqualizerChain -> AnalyserTap -> gain -> device
//! ```
//!
//! The analyser taps after the equalizer and before gain, so bars follow EQ
//! changes but not the volume slider or a crossfade ramp. Graphs are never
//! rewired; a new track gets a whole new graph from [`GraphBuilder`].

use crate::analyser::AnalyserTap;
use crate::equalizer::{EqualizerChain, EqualizerState};
use crate::error::Result;
use crate::source::AudioSource;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Graph shared between the control side and the device callback
pub type SharedGraph = Arc<Mutex<AudioGraph>>;

/// A source wired through EQ, analyser and gain
pub struct AudioGraph {
    source: Box<dyn AudioSource>,
    equalizer: EqualizerChain,
    analyser: Option<AnalyserTap>,
    gain: f32,
    speed: f32,
    sample_rate: u32,
    finished: bool,
}

impl AudioGraph {
    /// Fill `output` with the next block of interleaved stereo audio
    ///
    /// Returns the number of samples produced by the source; the remainder
    /// is silence. Once the source runs dry the graph reports finished.
    pub fn render(&mut self, output: &mut [f32]) -> usize {
        let usable = output.len() & !1;
        let produced = if self.finished {
            0
        } else {
            match self.source.read_samples(&mut output[..usable]) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Source read failed, ending track: {}", e);
                    self.finished = true;
                    0
                }
            }
        };

        let (live, rest) = output.split_at_mut(produced);
        self.equalizer.process(live);
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.push_frames(live);
        }
        for sample in live.iter_mut() {
            *sample *= self.gain;
        }
        rest.fill(0.0);

        if produced < usable && self.source.is_finished() {
            self.finished = true;
        }
        produced
    }

    pub fn position(&self) -> Duration {
        self.source.position()
    }

    pub fn duration(&self) -> Duration {
        self.source.duration()
    }

    /// True once the source has been read to the end
    pub fn is_finished(&self) -> bool {
        self.finished || self.source.is_finished()
    }

    /// Seek the source, clamped to its duration
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let target = position.min(self.source.duration());
        self.source.seek(target)?;
        self.finished = false;
        self.equalizer.reset();
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.clear();
        }
        Ok(())
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.gain = gain.max(0.0);
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
            self.source.set_speed(speed);
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn equalizer(&self) -> &EqualizerChain {
        &self.equalizer
    }

    pub fn equalizer_mut(&mut self) -> &mut EqualizerChain {
        &mut self.equalizer
    }

    /// The analyser tap, if the graph was built with one
    pub fn analyser_mut(&mut self) -> Option<&mut AnalyserTap> {
        self.analyser.as_mut()
    }

    pub fn has_analyser(&self) -> bool {
        self.analyser.is_some()
    }
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioGraph")
            .field("gain", &self.gain)
            .field("speed", &self.speed)
            .field("sample_rate", &self.sample_rate)
            .field("finished", &self.finished)
            .field("analyser", &self.analyser.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds a complete graph for one output instance
///
/// Every new output gets freshly built EQ filters and analyser, so settings
/// made while nothing was playing carry over to the next track.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    sample_rate: u32,
    equalizer: EqualizerState,
    analyser: bool,
    gain: f32,
    speed: f32,
}

impl GraphBuilder {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            equalizer: EqualizerState::new(),
            analyser: true,
            gain: 1.0,
            speed: 1.0,
        }
    }

    #[must_use]
    pub fn equalizer(mut self, state: &EqualizerState) -> Self {
        self.equalizer = state.clone();
        self
    }

    #[must_use]
    pub fn with_analyser(mut self, enabled: bool) -> Self {
        self.analyser = enabled;
        self
    }

    #[must_use]
    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    #[must_use]
    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn build(self, mut source: Box<dyn AudioSource>) -> AudioGraph {
        source.set_speed(self.speed);
        let mut graph = AudioGraph {
            source,
            equalizer: EqualizerChain::from_state(&self.equalizer, self.sample_rate),
            analyser: self.analyser.then(AnalyserTap::new),
            gain: 1.0,
            speed: 1.0,
            sample_rate: self.sample_rate,
            finished: false,
        };
        graph.set_gain(self.gain);
        graph.set_speed(self.speed);
        graph
    }

    pub fn build_shared(self, source: Box<dyn AudioSource>) -> SharedGraph {
        Arc::new(Mutex::new(self.build(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equalizer::EqPreset;
    use crate::source::MemorySource;

    fn tone(frames: usize) -> Box<dyn AudioSource> {
        let samples = (0..frames)
            .flat_map(|i| {
                let s = ((i as f32) * 0.05).sin() * 0.5;
                [s, s]
            })
            .collect();
        Box::new(MemorySource::new(samples, 1000, 1000).unwrap())
    }

    #[test]
    fn test_gain_scales_output() {
        let mut loud = GraphBuilder::new(1000).gain(1.0).build(tone(500));
        let mut quiet = GraphBuilder::new(1000).gain(0.25).build(tone(500));

        let mut a = vec![0.0; 200];
        let mut b = vec![0.0; 200];
        loud.render(&mut a);
        quiet.render(&mut b);
        for (x, y) in a.iter().zip(&b) {
            assert!((x * 0.25 - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_renders_silence_after_end() {
        let mut graph = GraphBuilder::new(1000).build(tone(10));
        let mut block = vec![1.0; 64];
        assert_eq!(graph.render(&mut block), 20);
        assert!(block[20..].iter().all(|&s| s == 0.0));
        assert!(graph.is_finished());

        graph.seek(Duration::ZERO).unwrap();
        assert!(!graph.is_finished());
    }

    #[test]
    fn test_analyser_ignores_gain() {
        let mut graph = GraphBuilder::new(1000).gain(0.0).build(tone(4096));
        let mut block = vec![0.0; 4096];
        graph.render(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));

        let bins = graph.analyser_mut().unwrap().frequency_data();
        assert!(bins.iter().any(|&b| b > 0.0));
    }

    #[test]
    fn test_builder_carries_eq_and_speed() {
        let mut eq = EqualizerState::new();
        eq.apply_preset(EqPreset::Pop);
        let graph = GraphBuilder::new(44_100)
            .equalizer(&eq)
            .speed(1.5)
            .with_analyser(false)
            .build(tone(10));

        assert_eq!(graph.equalizer().gains(), EqPreset::Pop.gains().unwrap());
        assert_eq!(graph.speed(), 1.5);
        assert!(!graph.has_analyser());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut graph = GraphBuilder::new(1000).build(tone(1000));
        graph.seek(Duration::from_secs(60)).unwrap();
        assert_eq!(graph.position(), Duration::from_secs(1));
    }
}
