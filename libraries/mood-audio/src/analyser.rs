//! Frequency analyser tap
//!
//! Keeps the most recent [`FFT_SIZE`] frames that passed through the graph
//! and turns them into per-bin magnitudes on demand. Magnitudes follow the
//! usual browser analyser conventions: Hann window, 0.8 temporal smoothing,
//! and a dB range of [-100, -30] mapped to [0, 1].

use crate::error::{AudioError, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Window length in frames
pub const FFT_SIZE: usize = 2048;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

/// Ring buffer plus FFT state
pub struct AnalyserTap {
    ring: Vec<f32>,
    write: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    claimed: bool,
}

impl AnalyserTap {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos()))
            .collect();

        Self {
            ring: vec![0.0; FFT_SIZE],
            write: 0,
            fft,
            window,
            scratch: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            smoothed: vec![0.0; FFT_SIZE / 2],
            claimed: false,
        }
    }

    /// Record interleaved stereo frames (mixed down to mono)
    pub fn push_frames(&mut self, interleaved: &[f32]) {
        for frame in interleaved.chunks_exact(2) {
            self.ring[self.write] = (frame[0] + frame[1]) * 0.5;
            self.write = (self.write + 1) % FFT_SIZE;
        }
    }

    /// `FFT_SIZE / 2` bins in [0, 1], lowest frequency first
    pub fn frequency_data(&mut self) -> Vec<f32> {
        for i in 0..FFT_SIZE {
            // Oldest sample first
            let sample = self.ring[(self.write + i) % FFT_SIZE];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / FFT_SIZE as f32;
        self.smoothed
            .iter_mut()
            .zip(&self.scratch)
            .map(|(smoothed, bin)| {
                *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * bin.norm() * norm;
                let db = 20.0 * smoothed.max(1e-10).log10();
                ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0)
            })
            .collect()
    }

    /// Forget recorded audio and smoothing history
    pub fn clear(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(0.0);
        self.write = 0;
    }

    /// Take exclusive ownership of the tap; a tap is claimable once per graph
    pub fn claim(&mut self) -> Result<()> {
        if self.claimed {
            return Err(AudioError::AnalyserUnavailable("tap already claimed".into()));
        }
        self.claimed = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.claimed = false;
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }
}

impl Default for AnalyserTap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnalyserTap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserTap")
            .field("write", &self.write)
            .field("claimed", &self.claimed)
            .finish_non_exhaustive()
    }
}

/// Average bins into `bar_count` equal-width groups
///
/// The top of the spectrum carries little musical energy, so only the lower
/// half of the bins is spread across the bars.
pub fn downsample_bins(bins: &[f32], bar_count: usize) -> Vec<f32> {
    if bar_count == 0 {
        return Vec::new();
    }
    let usable = (bins.len() / 2).max(bar_count.min(bins.len()));
    if usable == 0 {
        return vec![0.0; bar_count];
    }

    (0..bar_count)
        .map(|bar| {
            let start = bar * usable / bar_count;
            let end = ((bar + 1) * usable / bar_count).max(start + 1).min(usable);
            let group = &bins[start.min(usable - 1)..end];
            group.iter().sum::<f32>() / group.len() as f32
        })
        .collect()
}
