//! # RTP-Core: RTP classification and sequence arithmetic
//!
//! Turns UDP payloads into RTP packets and provides the modular arithmetic
//! needed to order them.
//!
//! ```rust
//! use bytes::Bytes;
//! use voipspy_rtp_core::{RtpClassifier, RtpPacket, SequenceUnwrapper};
//!
//! let wire = RtpPacket::new(0, 65535, 160, 0x1234, Bytes::from_static(&[0xFF; 160])).serialize();
//! let packet = RtpClassifier::default().classify_payload(wire)?;
//! assert_eq!(packet.payload.len(), 160);
//!
//! let mut unwrapper = SequenceUnwrapper::new();
//! assert_eq!(unwrapper.unwrap(packet.sequence_number, packet.timestamp), 65535);
//! assert_eq!(unwrapper.unwrap(0, 320), 65536);
//! # Ok::<(), voipspy_rtp_core::Error>(())
//! ```

pub mod classify;
pub mod error;
pub mod packet;
pub mod seq;
pub mod time;

pub use classify::{ClassifierConfig, RtpClassifier};
pub use error::Error;
pub use packet::{RtpHeaderExtension, RtpPacket, RTP_MIN_HEADER_SIZE, RTP_VERSION};
pub use seq::{seq_delta, timestamp_delta, SequenceUnwrapper, TimestampUnwrapper};

/// Result type alias for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// RTP sequence number
pub type RtpSequenceNumber = u16;

/// RTP timestamp
pub type RtpTimestamp = u32;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;

/// RTP contributing source identifier
pub type RtpCsrc = u32;
