//! Decoded-rate to graph-rate conversion

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample interleaved stereo from `source_rate` to `target_rate`
///
/// Returns the input untouched when the rates already match.
pub fn resample_stereo(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    const CHANNELS: usize = 2;

    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(AudioError::ResampleError(format!(
            "invalid rates {} -> {}",
            source_rate, target_rate
        )));
    }

    let frames = samples.len() / CHANNELS;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        frames,
        CHANNELS,
    )
    .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let mut deinterleaved = vec![Vec::with_capacity(frames); CHANNELS];
    for frame in samples.chunks_exact(CHANNELS) {
        for (channel, &sample) in deinterleaved.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }

    let resampled = resampler
        .process(&deinterleaved, None)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let output_frames = resampled[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * CHANNELS);
    for frame_idx in 0..output_frames {
        for channel_data in &resampled {
            interleaved.push(channel_data[frame_idx]);
        }
    }

    tracing::debug!(
        source_rate,
        target_rate,
        input_frames = frames,
        output_frames,
        "Resampled track"
    );

    Ok(interleaved)
}
