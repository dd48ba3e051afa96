//! Stream summaries and run diagnostics
//!
//! [`StreamSummary`] is the external contract written to `metadata.json`.
//! The first eight fields are the legacy `metadata.json` stream fields; the
//! rest are diagnostics. Fields are only ever added, and
//! [`SUMMARY_VERSION`] changes when a field changes meaning.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::decoder::DecodedStream;
use crate::sequencer::ReassembledStream;

/// Version of the metadata format
pub const SUMMARY_VERSION: u32 = 1;

/// Round to two decimals
pub fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Per-stream metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSummary {
    pub source_ip: IpAddr,
    pub destination_ip: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
    pub ssrc: u32,
    /// Primary payload type
    pub payload_type: u8,
    /// Unique packets
    pub packets: u64,
    /// Seconds of audio, two decimals
    pub duration: f64,

    pub payload_types: Vec<u8>,
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub packets_received: u64,
    pub duplicates: u64,
    pub gaps: u64,
    pub lost: u64,
    pub unsupported: u64,
    pub reordered: u64,
    pub low_confidence: bool,
    /// MD5 of the audio samples
    pub digest: String,
}

impl StreamSummary {
    pub fn new(stream: &ReassembledStream, decoded: &DecodedStream, digest: String) -> Self {
        let key = stream.key;
        let frames = decoded.frames();
        let duration = if decoded.format.sample_rate == 0 {
            0.0
        } else {
            frames as f64 / f64::from(decoded.format.sample_rate)
        };
        let payload_type = decoded
            .format
            .payload_type
            .or_else(|| stream.packets().next().map(|p| p.payload_type))
            .unwrap_or_default();

        Self {
            source_ip: key.source,
            destination_ip: key.destination,
            source_port: key.source_port,
            destination_port: key.destination_port,
            ssrc: key.ssrc,
            payload_type,
            packets: stream.stats.unique,
            duration: round_secs(duration),
            payload_types: decoded.payload_types.clone(),
            codec: decoded.format.codec.clone(),
            sample_rate: decoded.format.sample_rate,
            channels: decoded.format.channels,
            packets_received: stream.stats.received,
            duplicates: stream.stats.duplicates,
            gaps: stream.stats.gaps,
            lost: stream.stats.lost,
            unsupported: decoded.stats.unsupported_packets + decoded.stats.decode_errors,
            reordered: stream.stats.reordered,
            low_confidence: stream.low_confidence,
            digest,
        }
    }
}

/// Run-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub frames_total: u64,
    /// Truncated frames and frames with inconsistent headers
    pub frames_dropped: u64,
    pub frames_non_udp: u64,
    /// UDP datagrams the classifier rejected
    pub frames_non_rtp: u64,
    pub rtp_packets: u64,
    pub streams: u64,
    pub duplicates: u64,
    pub gaps: u64,
    pub unsupported_packets: u64,
    pub low_confidence_streams: u64,
}

impl RunDiagnostics {
    /// Every frame is accounted for exactly once
    pub fn is_balanced(&self) -> bool {
        self.rtp_packets + self.frames_dropped + self.frames_non_udp + self.frames_non_rtp
            == self.frames_total
    }

    /// Fold one stream's counters in
    pub fn add_stream(&mut self, summary: &StreamSummary) {
        self.streams += 1;
        self.duplicates += summary.duplicates;
        self.gaps += summary.gaps;
        self.unsupported_packets += summary.unsupported;
        if summary.low_confidence {
            self.low_confidence_streams += 1;
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub version: u32,
    pub rtp_data: Vec<StreamSummary>,
    pub diagnostics: RunDiagnostics,
}

impl RunMetadata {
    pub fn new(rtp_data: Vec<StreamSummary>, diagnostics: RunDiagnostics) -> Self {
        Self {
            version: SUMMARY_VERSION,
            rtp_data,
            diagnostics,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_secs() {
        assert_eq!(round_secs(2.004), 2.0);
        assert_eq!(round_secs(2.456), 2.46);
        assert_eq!(round_secs(0.0), 0.0);
    }

    #[test]
    fn test_balance() {
        let diagnostics = RunDiagnostics {
            frames_total: 10,
            frames_dropped: 1,
            frames_non_udp: 2,
            frames_non_rtp: 3,
            rtp_packets: 4,
            ..RunDiagnostics::default()
        };
        assert!(diagnostics.is_balanced());
        assert!(!RunDiagnostics { rtp_packets: 5, ..diagnostics }.is_balanced());
    }

    #[test]
    fn test_metadata_shape() {
        let json = RunMetadata::new(Vec::new(), RunDiagnostics::default())
            .to_json_pretty()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["rtp_data"].as_array().unwrap().is_empty());
        assert_eq!(value["diagnostics"]["frames_total"], 0);
    }
}
