//! Error types for stream reconstruction
//!
//! Only a malformed capture, bad configuration or an output failure ends a
//! run. Frame, packet and transcription failures are counted or reported
//! and never invalidate an artifact.

use thiserror::Error;
use voipspy_capture_core::CaptureError;
use voipspy_codec_core::CodecError;

/// Result type for media-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Media-core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Capture container errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Payload registry and decoder errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// WAV encoding failed
    #[error("WAV encoding failed: {0}")]
    Wav(String),

    /// I/O error while writing output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The transcriber failed, timed out or was cancelled
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// `start` was called while a capture session is running
    #[error("A capture session is already active on {interface}")]
    SessionAlreadyActive { interface: String },

    /// The capture backend could not start or stop
    #[error("Capture backend error: {0}")]
    Backend(String),

    /// A second result was written for the same stream
    #[error("Result already recorded for stream {0}")]
    AlreadyRecorded(String),

    /// Metadata serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }

    /// Create a new transcription failure
    pub fn transcription_failed(details: impl Into<String>) -> Self {
        Self::TranscriptionFailed(details.into())
    }

    /// Whether the run (or the artifact set) survives this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Capture(err) => err.is_recoverable(),
            Self::Codec(err) => err.is_recoverable(),
            Self::TranscriptionFailed(_) | Self::SessionAlreadyActive { .. } => true,
            Self::Wav(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::Backend(_)
            | Self::AlreadyRecorded(_)
            | Self::Serialization(_) => false,
        }
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => Self::Io(io),
            other => Self::Wav(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let fatal: Error = CaptureError::malformed_capture("unknown magic").into();
        assert!(!fatal.is_recoverable());
        let truncated: Error = CaptureError::TruncatedFrame {
            index: 3,
            declared: 200,
            available: 10,
        }
        .into();
        assert!(truncated.is_recoverable());
        assert!(Error::transcription_failed("timed out").is_recoverable());
        assert!(!Error::AlreadyRecorded("ssrc=0x1".into()).is_recoverable());
    }
}
