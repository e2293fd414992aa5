/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// Local file not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Remote fetch failed (network error or non-success status)
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Unsupported container or codec
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Sample rate conversion failed
    #[error("Resample error: {0}")]
    ResampleError(String),

    /// Seek error
    #[error("Seek error: {0}")]
    SeekError(String),

    /// Unknown equalizer preset name
    #[error("Unknown equalizer preset: {0}")]
    UnknownPreset(String),

    /// The graph has no analyser tap, or it is already claimed
    #[error("Analyser unavailable: {0}")]
    AnalyserUnavailable(String),

    /// No output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// The output refused to start or resume
    #[error("Output rejected: {0}")]
    OutputRejected(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Symphonia error
    #[error("Symphonia error: {0}")]
    Symphonia(String),
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match err {
            Error::Unsupported(what) => AudioError::UnsupportedFormat(what.to_string()),
            Error::DecodeError(what) => AudioError::DecodeError(what.to_string()),
            Error::SeekError(kind) => AudioError::SeekError(format!("{kind:?}")),
            Error::IoError(io) => AudioError::Io(io),
            other => AudioError::Symphonia(other.to_string()),
        }
    }
}
