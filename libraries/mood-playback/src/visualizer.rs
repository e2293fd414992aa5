//! Visualizer feed
//!
//! Reads the live graph's analyser tap and turns it into a small number of
//! bars on a 0..100 scale. If the tap cannot be claimed the feed switches to
//! simulated bars instead of going dark; when nothing is playing every bar
//! sits at a low floor so the display does not flicker.

use mood_audio::{downsample_bins, AudioError, AudioGraph, SharedGraph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Bar height while idle
pub const IDLE_BAR_LEVEL: f32 = 10.0;

/// Range of simulated bar heights
const SIMULATED_RANGE: std::ops::Range<f32> = 20.0..100.0;

/// Where bars come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerMode {
    /// No graph attached
    Detached,
    /// Reading the graph's analyser tap
    Live,
    /// The tap was unavailable; bars are random
    Simulated,
}

#[derive(Debug)]
pub struct FrequencyAnalyzer {
    bar_count: usize,
    graph: Weak<Mutex<AudioGraph>>,
    mode: AnalyzerMode,
    rng: StdRng,
}

impl FrequencyAnalyzer {
    pub fn new(bar_count: usize) -> Self {
        Self {
            bar_count: bar_count.max(1),
            graph: Weak::new(),
            mode: AnalyzerMode::Detached,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn set_bar_count(&mut self, bar_count: usize) {
        self.bar_count = bar_count.max(1);
    }

    pub fn mode(&self) -> AnalyzerMode {
        self.mode
    }

    /// Claim the analyser tap of a new graph
    ///
    /// On failure the analyzer stays usable in simulated mode and the error
    /// is returned for reporting only.
    pub fn attach(&mut self, graph: &SharedGraph) -> Result<(), AudioError> {
        self.detach();
        self.graph = Arc::downgrade(graph);

        let claimed = {
            let mut guard = graph.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.analyser_mut() {
                Some(tap) => tap.claim(),
                None => Err(AudioError::AnalyserUnavailable("graph has no analyser tap".into())),
            }
        };

        match claimed {
            Ok(()) => {
                self.mode = AnalyzerMode::Live;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Visualizer falling back to simulated bars: {}", e);
                self.mode = AnalyzerMode::Simulated;
                Err(e)
            }
        }
    }

    /// Release the tap (if we hold it) and forget the graph
    pub fn detach(&mut self) {
        if self.mode == AnalyzerMode::Live {
            if let Some(graph) = self.graph.upgrade() {
                let mut guard = graph.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(tap) = guard.analyser_mut() {
                    tap.release();
                }
            }
        }
        self.graph = Weak::new();
        self.mode = AnalyzerMode::Detached;
    }

    /// One frame of bars
    pub fn frame(&mut self, playing: bool) -> Vec<f32> {
        if !playing {
            return vec![IDLE_BAR_LEVEL; self.bar_count];
        }

        match self.mode {
            AnalyzerMode::Live => match self.graph.upgrade() {
                Some(graph) => {
                    let bins = {
                        let mut guard = graph.lock().unwrap_or_else(PoisonError::into_inner);
                        guard.analyser_mut().map(|tap| tap.frequency_data())
                    };
                    match bins {
                        Some(bins) => downsample_bins(&bins, self.bar_count)
                            .into_iter()
                            .map(|level| (level * 100.0).max(IDLE_BAR_LEVEL))
                            .collect(),
                        None => self.simulated(),
                    }
                }
                None => {
                    // Graph replaced underneath us
                    self.graph = Weak::new();
                    self.mode = AnalyzerMode::Detached;
                    vec![IDLE_BAR_LEVEL; self.bar_count]
                }
            },
            AnalyzerMode::Simulated => self.simulated(),
            AnalyzerMode::Detached => vec![IDLE_BAR_LEVEL; self.bar_count],
        }
    }

    fn simulated(&mut self) -> Vec<f32> {
        (0..self.bar_count)
            .map(|_| self.rng.gen_range(SIMULATED_RANGE))
            .collect()
    }
}
