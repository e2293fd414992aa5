//! Track byte fetching: HTTP(S) URLs or local paths

use crate::error::{AudioError, Result};
use std::path::Path;

/// Read the whole resource behind `url`
///
/// `http://` and `https://` go over the network; `file://` URLs and bare
/// paths are read from disk.
pub async fn fetch_source(url: &str) -> Result<Vec<u8>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_remote(url).await;
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AudioError::FileNotFound(path.to_string()))
        }
        Err(e) => Err(AudioError::Io(e)),
    }
}

async fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    let fetch_error = |reason: String| AudioError::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = reqwest::get(url)
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP {}", status)));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;
    tracing::debug!(url, bytes = bytes.len(), "Fetched remote track");
    Ok(bytes.to_vec())
}

/// File extension of the last path segment, ignoring query and fragment
pub fn extension_hint(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let segment = without_query.rsplit('/').next().unwrap_or(without_query);
    Path::new(segment)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
