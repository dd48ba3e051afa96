//! Error handling for the codec library
//!
//! Decoding errors are per packet: the caller substitutes silence for the
//! packet's time span and carries on with the stream.

use std::fmt;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Error type for payload registry and decoder operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A known payload format without a decoder
    #[error("Unsupported codec type: {codec_type}")]
    UnsupportedCodec { codec_type: String },

    /// A payload type that is neither static nor mapped
    #[error("Unknown payload type: {payload_type}")]
    UnknownPayloadType { payload_type: u8 },

    /// Invalid payload data
    #[error("Invalid payload data: {details}")]
    InvalidPayload { details: String },

    /// Invalid codec configuration
    #[error("Invalid codec configuration: {details}")]
    InvalidConfig { details: String },
}

impl CodecError {
    /// Create a new unsupported codec error
    pub fn unsupported_codec(codec_type: impl Into<String>) -> Self {
        Self::UnsupportedCodec {
            codec_type: codec_type.into(),
        }
    }

    /// Create a new invalid payload error
    pub fn invalid_payload(details: impl Into<String>) -> Self {
        Self::InvalidPayload {
            details: details.into(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }

    /// Check if this error only affects the packet being decoded
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnsupportedCodec { .. }
            | Self::UnknownPayloadType { .. }
            | Self::InvalidPayload { .. } => true,
            Self::InvalidConfig { .. } => false,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedCodec { .. } | Self::UnknownPayloadType { .. } => {
                ErrorCategory::Unsupported
            }
            Self::InvalidPayload { .. } => ErrorCategory::Processing,
            Self::InvalidConfig { .. } => ErrorCategory::Configuration,
        }
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Payload format has no decoder
    Unsupported,
    /// Payload could not be decoded
    Processing,
    /// Configuration and parameter errors
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "Unsupported"),
            Self::Processing => write!(f, "Processing"),
            Self::Configuration => write!(f, "Configuration"),
        }
    }
}
