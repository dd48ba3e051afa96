use thiserror::Error;

/// Reasons a UDP payload is not accepted as an RTP packet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer is too small for the fixed header or a declared field
    #[error("Buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// The version bits are not 2
    #[error("Invalid RTP version: {0}")]
    InvalidVersion(u8),

    /// Padding count is zero or larger than the packet body
    #[error("Invalid padding: {padding} bytes declared, {available} available")]
    InvalidPadding { padding: usize, available: usize },

    /// Payload type outside the accepted set
    #[error("Implausible payload type: {0}")]
    PayloadType(u8),

    /// One of the UDP ports is below the configured minimum
    #[error("Port {0} is below the media port range")]
    PortFiltered(u16),
}

impl Error {
    /// Short reason label used in diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            Self::BufferTooSmall { .. } => "too_short",
            Self::InvalidVersion(_) => "version",
            Self::InvalidPadding { .. } => "padding",
            Self::PayloadType(_) => "payload_type",
            Self::PortFiltered(_) => "port",
        }
    }
}
