//! Fetch, decode and resample a track into a playable source

use crate::decoder::decode_bytes;
use crate::error::{AudioError, Result};
use crate::fetch::{extension_hint, fetch_source};
use crate::resample::resample_stereo;
use crate::source::{AudioSource, MemorySource};

/// Loads tracks for a graph running at a fixed sample rate
#[derive(Debug, Clone, Copy)]
pub struct SymphoniaLoader {
    sample_rate: u32,
}

impl SymphoniaLoader {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Load `url` into memory at the graph rate
    ///
    /// Decoding and resampling run on the blocking pool.
    pub async fn load(&self, url: &str) -> Result<MemorySource> {
        let bytes = fetch_source(url).await?;
        let extension = extension_hint(url);
        let target_rate = self.sample_rate;

        let source = tokio::task::spawn_blocking(move || -> Result<MemorySource> {
            let decoded = decode_bytes(bytes, extension.as_deref())?;
            let samples = resample_stereo(decoded.samples, decoded.sample_rate, target_rate)?;
            MemorySource::new(samples, target_rate, target_rate)
        })
        .await
        .map_err(|e| AudioError::DecodeError(format!("decode task failed: {}", e)))??;

        tracing::info!(
            url,
            duration_secs = source.duration().as_secs_f64(),
            "Loaded track"
        );
        Ok(source)
    }
}
