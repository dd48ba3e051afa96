//! RTP classification of UDP payloads
//!
//! RTP carries no magic number, so classification is a heuristic: version
//! bits, a plausible payload type, header fields that fit the datagram and
//! ports outside the well-known range. Any UDP protocol whose first byte
//! happens to start with `10` and whose second byte falls in the accepted
//! payload type set will pass. Such false positives usually end up as short,
//! low-confidence streams and are tolerated downstream.
//!
//! RTCP shares the version bits; its packet types 200-204 read as payload
//! types 72-76 once the marker bit is masked off, which the default set
//! excludes.

use serde::{Deserialize, Serialize};
use tracing::trace;
use voipspy_capture_core::CaptureFrame;

use crate::error::Error;
use crate::packet::RtpPacket;
use crate::Result;

/// Classifier settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Inclusive payload type ranges accepted as audio
    pub payload_types: Vec<(u8, u8)>,

    /// Datagrams with either port below this value are not RTP (0 disables)
    pub min_port: u16,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            payload_types: vec![(0, 23), (96, 127)],
            min_port: 1024,
        }
    }
}

impl ClassifierConfig {
    /// Whether `payload_type` is in the accepted set
    pub fn accepts_payload_type(&self, payload_type: u8) -> bool {
        self.payload_types
            .iter()
            .any(|&(first, last)| (first..=last).contains(&payload_type))
    }
}

/// Decides whether a UDP datagram carries RTP
#[derive(Debug, Clone, Default)]
pub struct RtpClassifier {
    config: ClassifierConfig,
}

impl RtpClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a captured UDP frame
    ///
    /// On success the packet carries the frame's arrival time and index.
    pub fn classify(&self, frame: &CaptureFrame) -> Result<RtpPacket> {
        let min_port = self.config.min_port;
        for port in [frame.source_port, frame.destination_port] {
            if port < min_port {
                return Err(Error::PortFiltered(port));
            }
        }

        let packet = self
            .classify_payload(frame.payload())
            .map_err(|err| {
                trace!("frame #{} is not RTP: {}", frame.index, err);
                err
            })?;
        Ok(packet.with_arrival(frame.timestamp, frame.index))
    }

    /// Classify a bare UDP payload
    pub fn classify_payload(&self, payload: bytes::Bytes) -> Result<RtpPacket> {
        let packet = RtpPacket::parse(payload)?;
        if !self.config.accepts_payload_type(packet.payload_type) {
            return Err(Error::PayloadType(packet.payload_type));
        }
        Ok(packet)
    }
}
