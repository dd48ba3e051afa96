//! Error handling for capture parsing
//!
//! Only [`CaptureError::MalformedCapture`] aborts a run. Every frame-level
//! error is reported for that frame alone and parsing moves on.

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors produced while reading a capture container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The global header (pcap) or section header (pcapng) is absent or unreadable
    #[error("Malformed capture: {reason}")]
    MalformedCapture { reason: String },

    /// A record declares more bytes than the capture still holds
    #[error("Truncated frame #{index}: declared {declared} bytes, {available} available")]
    TruncatedFrame {
        index: u64,
        declared: usize,
        available: usize,
    },

    /// A record is complete but its link/network/transport headers are inconsistent
    #[error("Malformed frame #{index}: {reason}")]
    MalformedFrame { index: u64, reason: String },

    /// I/O failure while loading a capture file
    #[error("I/O operation failed: {reason}")]
    Io { reason: String },
}

impl CaptureError {
    /// Create a new malformed capture error
    pub fn malformed_capture(reason: impl Into<String>) -> Self {
        Self::MalformedCapture {
            reason: reason.into(),
        }
    }

    /// Create a new malformed frame error
    pub fn malformed_frame(index: u64, reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            index,
            reason: reason.into(),
        }
    }

    /// Whether parsing can continue after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::TruncatedFrame { .. } | Self::MalformedFrame { .. } => true,
            Self::MalformedCapture { .. } | Self::Io { .. } => false,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            reason: error.to_string(),
        }
    }
}
