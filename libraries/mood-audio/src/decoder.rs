/// Whole-track decoding via Symphonia
///
/// Tracks are short enough to hold in memory, so a load decodes every packet
/// up front into interleaved stereo f32.
use crate::error::{AudioError, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded track at its native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved stereo samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// Decode an in-memory file; `extension` helps the format probe
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(std::io::Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe stream: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeError("No audio tracks found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet; skip it and keep going
                tracing::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        push_stereo(buf.samples(), spec.channels.count(), &mut samples);
    }

    let sample_rate =
        sample_rate.ok_or_else(|| AudioError::DecodeError("Unknown sample rate".to_string()))?;
    if samples.is_empty() {
        return Err(AudioError::DecodeError("No audio frames decoded".to_string()));
    }

    tracing::debug!(
        frames = samples.len() / 2,
        sample_rate,
        "Decoded track"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Append interleaved frames of any channel count as stereo
///
/// Mono is duplicated; surround keeps front L/R and folds the center and
/// rear channels in at -3 dB.
fn push_stereo(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    const FOLD: f32 = std::f32::consts::FRAC_1_SQRT_2;

    match channels {
        0 => {}
        1 => {
            out.reserve(interleaved.len() * 2);
            for &s in interleaved {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(interleaved),
        _ => {
            out.reserve(interleaved.len() / channels * 2);
            for frame in interleaved.chunks_exact(channels) {
                let center = frame[2] * FOLD;
                let (rear_l, rear_r) = if channels >= 6 {
                    (frame[4] * FOLD, frame[5] * FOLD)
                } else {
                    (0.0, 0.0)
                };
                out.push((frame[0] + center + rear_l).clamp(-1.0, 1.0));
                out.push((frame[1] + center + rear_r).clamp(-1.0, 1.0));
            }
        }
    }
}
