/// Stereo biquad filter
///
/// RBJ cookbook low-shelf, peaking and high-shelf sections. Coefficient
/// changes made while audio is running are smoothed per sample so a band
/// can be dragged without zipper noise.
use serde::{Deserialize, Serialize};

/// Filter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Boosts/cuts below the corner frequency
    LowShelf,
    /// Boosts/cuts around the center frequency with Q bandwidth
    Peaking,
    /// Boosts/cuts above the corner frequency
    HighShelf,
}

/// Per-sample smoothing factor toward the target coefficients.
/// Roughly a 10ms time constant at 44.1kHz.
const SMOOTH_COEFF: f32 = 0.002;

/// Outputs below this are flushed to zero (denormals)
const DENORMAL_FLOOR: f32 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const BYPASS: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn approach(&mut self, target: &Self) {
        self.b0 += SMOOTH_COEFF * (target.b0 - self.b0);
        self.b1 += SMOOTH_COEFF * (target.b1 - self.b1);
        self.b2 += SMOOTH_COEFF * (target.b2 - self.b2);
        self.a1 += SMOOTH_COEFF * (target.a1 - self.a1);
        self.a2 += SMOOTH_COEFF * (target.a2 - self.a2);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl ChannelState {
    #[inline]
    fn process(&mut self, c: &Coefficients, input: f32) -> f32 {
        let mut out = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        if out.abs() < DENORMAL_FLOOR {
            out = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

/// One stereo filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    kind: FilterKind,
    frequency: f32,
    q: f32,
    gain_db: f32,
    sample_rate: u32,
    target: Coefficients,
    active: Coefficients,
    left: ChannelState,
    right: ChannelState,
}

impl BiquadFilter {
    /// Create a filter at 0 dB gain (pass-through)
    pub fn new(kind: FilterKind, frequency: f32, q: f32, sample_rate: u32) -> Self {
        let mut filter = Self {
            kind,
            frequency,
            q: q.clamp(0.1, 10.0),
            gain_db: 0.0,
            sample_rate,
            target: Coefficients::BYPASS,
            active: Coefficients::BYPASS,
            left: ChannelState::default(),
            right: ChannelState::default(),
        };
        filter.update_target();
        filter.active = filter.target;
        filter
    }

    /// Create a filter and snap straight to the given gain
    pub fn with_gain(kind: FilterKind, frequency: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        let mut filter = Self::new(kind, frequency, q, sample_rate);
        filter.gain_db = gain_db;
        filter.update_target();
        filter.active = filter.target;
        filter
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Change the gain; the running coefficients glide toward the new response
    pub fn set_gain_db(&mut self, gain_db: f32) {
        if (gain_db - self.gain_db).abs() < f32::EPSILON {
            return;
        }
        self.gain_db = gain_db;
        self.update_target();
    }

    fn update_target(&mut self) {
        let sample_rate = self.sample_rate as f32;
        if sample_rate < 1.0 {
            return;
        }

        let a = 10.0_f32.powf(self.gain_db / 40.0);
        // Near-Nyquist corners are unstable
        let frequency = self.frequency.min(sample_rate * 0.45);
        let omega = 2.0 * std::f32::consts::PI * frequency / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();

        self.target = match self.kind {
            FilterKind::Peaking => {
                let alpha = sin_omega / (2.0 * self.q);
                Coefficients::normalized(
                    1.0 + alpha * a,
                    -2.0 * cos_omega,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_omega,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                let alpha = sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / self.q - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                Coefficients::normalized(
                    a * ((a + 1.0) - (a - 1.0) * cos_omega + beta),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
                    a * ((a + 1.0) - (a - 1.0) * cos_omega - beta),
                    (a + 1.0) + (a - 1.0) * cos_omega + beta,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
                    (a + 1.0) + (a - 1.0) * cos_omega - beta,
                )
            }
            FilterKind::HighShelf => {
                let alpha = sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / self.q - 1.0) + 2.0).sqrt();
                let beta = 2.0 * a.sqrt() * alpha;
                Coefficients::normalized(
                    a * ((a + 1.0) + (a - 1.0) * cos_omega + beta),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
                    a * ((a + 1.0) + (a - 1.0) * cos_omega - beta),
                    (a + 1.0) - (a - 1.0) * cos_omega + beta,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
                    (a + 1.0) - (a - 1.0) * cos_omega - beta,
                )
            }
        };
    }

    /// Process one stereo frame
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.active != self.target {
            self.active.approach(&self.target);
        }
        (
            self.left.process(&self.active, left),
            self.right.process(&self.active, right),
        )
    }

    /// Process an interleaved stereo buffer in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Clear filter memory and snap to the target response
    pub fn reset(&mut self) {
        self.left = ChannelState::default();
        self.right = ChannelState::default();
        self.active = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
                [v, v]
            })
            .collect()
    }

    fn rms_tail(buffer: &[f32]) -> f32 {
        let tail = &buffer[buffer.len() / 2..];
        (tail.iter().map(|s| s * s).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn test_zero_gain_is_transparent() {
        for kind in [FilterKind::LowShelf, FilterKind::Peaking, FilterKind::HighShelf] {
            let mut filter = BiquadFilter::new(kind, 1000.0, 1.0, 44_100);
            let input = sine(440.0, 44_100, 4096);
            let mut output = input.clone();
            filter.process(&mut output);
            for (a, b) in input.iter().zip(&output) {
                assert!((a - b).abs() < 1e-4, "{kind:?} altered the signal");
            }
        }
    }

    #[test]
    fn test_peaking_boost_raises_center() {
        let mut filter = BiquadFilter::with_gain(FilterKind::Peaking, 1000.0, 1.0, 6.0, 44_100);
        let input = sine(1000.0, 44_100, 8192);
        let mut output = input.clone();
        filter.process(&mut output);

        let gain = rms_tail(&output) / rms_tail(&input);
        // +6 dB is roughly 2x amplitude
        assert!((gain - 2.0).abs() < 0.1, "gain was {gain}");
    }

    #[test]
    fn test_low_shelf_leaves_highs_alone() {
        let mut filter = BiquadFilter::with_gain(FilterKind::LowShelf, 60.0, 1.0, 6.0, 44_100);
        let input = sine(8000.0, 44_100, 8192);
        let mut output = input.clone();
        filter.process(&mut output);

        let gain = rms_tail(&output) / rms_tail(&input);
        assert!((gain - 1.0).abs() < 0.05, "gain was {gain}");
    }

    #[test]
    fn test_gain_change_glides() {
        let mut filter = BiquadFilter::new(FilterKind::Peaking, 1000.0, 1.0, 44_100);
        filter.set_gain_db(12.0);
        assert_ne!(filter.active, filter.target);

        let mut buffer = sine(1000.0, 44_100, 44_100);
        filter.process(&mut buffer);
        assert!((filter.active.b0 - filter.target.b0).abs() < 1e-4);

        filter.reset();
        assert_eq!(filter.active, filter.target);
    }

    #[test]
    fn test_extreme_frequency_stays_finite() {
        let mut filter = BiquadFilter::with_gain(FilterKind::HighShelf, 30_000.0, 1.0, 12.0, 44_100);
        let mut buffer = sine(10_000.0, 44_100, 4096);
        filter.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
