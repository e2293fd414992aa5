//! Decoded audio sources feeding the graph

use crate::error::{AudioError, Result};
use std::sync::Arc;
use std::time::Duration;

/// A stream of decoded, interleaved stereo samples
///
/// Implementors provide samples and seeking. The graph pulls from exactly one
/// source and never needs to know whether it came from a file, a network
/// fetch or a test fixture.
pub trait AudioSource: Send {
    /// Read the next chunk of samples
    ///
    /// Samples are interleaved stereo f32 in [-1.0, 1.0]. Returns the number
    /// of samples written, which is less than `buffer.len()` only at the end
    /// of the track.
    fn read_samples(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Seek to a position from the start of the track
    ///
    /// Positions past the end clamp to the end.
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Total track duration
    fn duration(&self) -> Duration;

    /// Current read position
    fn position(&self) -> Duration;

    /// Whether every sample has been read
    fn is_finished(&self) -> bool;

    /// Set the playback speed multiplier (1.0 = normal)
    ///
    /// Sources that cannot vary speed ignore this.
    fn set_speed(&mut self, _speed: f32) {}

    /// Equivalent to `seek(Duration::ZERO)`
    fn reset(&mut self) -> Result<()> {
        self.seek(Duration::ZERO)
    }
}

/// A fully decoded track held in memory
///
/// The read head is fractional so the source can play at any speed: each
/// output frame advances it by `speed * source_rate / output_rate` and
/// samples between frames are linearly interpolated.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Arc<[f32]>,
    source_rate: u32,
    output_rate: u32,
    cursor: f64,
    speed: f32,
}

impl MemorySource {
    /// Wrap interleaved stereo samples recorded at `source_rate`, played at `output_rate`
    pub fn new(samples: Vec<f32>, source_rate: u32, output_rate: u32) -> Result<Self> {
        if source_rate == 0 || output_rate == 0 {
            return Err(AudioError::DecodeError("sample rate must be non-zero".into()));
        }
        if samples.len() % 2 != 0 {
            return Err(AudioError::DecodeError(format!(
                "expected interleaved stereo, got {} samples",
                samples.len()
            )));
        }

        Ok(Self {
            samples: samples.into(),
            source_rate,
            output_rate,
            cursor: 0.0,
            speed: 1.0,
        })
    }

    /// A silent track of the given length, already at the output rate
    pub fn silent(duration: Duration, sample_rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate.max(1))).round() as usize;
        Self {
            samples: vec![0.0; frames * 2].into(),
            source_rate: sample_rate.max(1),
            output_rate: sample_rate.max(1),
            cursor: 0.0,
            speed: 1.0,
        }
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Sample rate of the stored samples
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Current speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    fn step(&self) -> f64 {
        f64::from(self.speed) * f64::from(self.source_rate) / f64::from(self.output_rate)
    }

    #[inline]
    fn frame_at(&self, index: usize) -> (f32, f32) {
        let last = self.frames().saturating_sub(1);
        let i = index.min(last) * 2;
        (self.samples[i], self.samples[i + 1])
    }
}

impl AudioSource for MemorySource {
    fn read_samples(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let frames = self.frames();
        if frames == 0 {
            return Ok(0);
        }

        let step = self.step();
        let mut written = 0;

        for out in buffer.chunks_exact_mut(2) {
            if self.cursor >= frames as f64 {
                break;
            }

            let index = self.cursor.floor() as usize;
            let frac = (self.cursor - index as f64) as f32;
            let (l0, r0) = self.frame_at(index);
            let (l1, r1) = self.frame_at(index + 1);

            out[0] = l0 + (l1 - l0) * frac;
            out[1] = r0 + (r1 - r0) * frac;

            self.cursor += step;
            written += 2;
        }

        Ok(written)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let target = position.as_secs_f64() * f64::from(self.source_rate);
        self.cursor = target.min(self.frames() as f64);
        Ok(())
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.source_rate))
    }

    fn position(&self) -> Duration {
        let frames = self.cursor.min(self.frames() as f64);
        Duration::from_secs_f64(frames / f64::from(self.source_rate))
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.frames() as f64
    }

    fn set_speed(&mut self, speed: f32) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = i as f32 / frames as f32;
                [v, -v]
            })
            .collect()
    }

    #[test]
    fn test_reads_until_end() {
        let mut source = MemorySource::new(ramp(100), 100, 100).unwrap();
        assert_eq!(source.duration(), Duration::from_secs(1));

        let mut buffer = vec![0.0; 150];
        assert_eq!(source.read_samples(&mut buffer).unwrap(), 150);
        assert!(!source.is_finished());

        assert_eq!(source.read_samples(&mut buffer).unwrap(), 50);
        assert!(source.is_finished());
        assert_eq!(source.read_samples(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_double_speed_consumes_twice_as_fast() {
        let mut source = MemorySource::new(ramp(1000), 1000, 1000).unwrap();
        source.set_speed(2.0);

        let mut buffer = vec![0.0; 200];
        source.read_samples(&mut buffer).unwrap();
        assert!((source.position().as_secs_f64() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_half_speed_interpolates() {
        let mut source = MemorySource::new(ramp(10), 10, 10).unwrap();
        source.set_speed(0.5);

        let mut buffer = vec![0.0; 4];
        source.read_samples(&mut buffer).unwrap();
        assert!((buffer[2] - 0.05).abs() < 1e-6);
        assert!((buffer[3] + 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_rate_conversion_preserves_duration() {
        let mut source = MemorySource::new(ramp(22_050), 22_050, 44_100).unwrap();
        let mut buffer = vec![0.0; 44_100 * 2];
        let read = source.read_samples(&mut buffer).unwrap();
        assert_eq!(read, 44_100 * 2);
        assert!(source.is_finished());
    }

    #[test]
    fn test_seek_clamps_to_end() {
        let mut source = MemorySource::silent(Duration::from_secs(3), 1000);
        source.seek(Duration::from_secs(10)).unwrap();
        assert_eq!(source.position(), Duration::from_secs(3));
        assert!(source.is_finished());

        source.reset().unwrap();
        assert_eq!(source.position(), Duration::ZERO);
        assert!(!source.is_finished());
    }

    #[test]
    fn test_rejects_odd_sample_count() {
        assert!(MemorySource::new(vec![0.0; 3], 44_100, 44_100).is_err());
        assert!(MemorySource::new(vec![0.0; 4], 0, 44_100).is_err());
    }

    #[test]
    fn test_ignores_invalid_speed() {
        let mut source = MemorySource::silent(Duration::from_secs(1), 100);
        source.set_speed(f32::NAN);
        source.set_speed(-1.0);
        assert_eq!(source.speed(), 1.0);
    }
}
