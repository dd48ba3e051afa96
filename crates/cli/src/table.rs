//! Terminal tables

use tabled::settings::Style;
use tabled::{Table, Tabled};
use voipspy_media_core::{RunDiagnostics, StreamSummary};

#[derive(Tabled)]
struct StreamRow {
    #[tabled(rename = "SSRC")]
    ssrc: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "PT")]
    payload_type: u8,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Packets")]
    packets: u64,
    #[tabled(rename = "Lost")]
    lost: u64,
    #[tabled(rename = "Dup")]
    duplicates: u64,
    #[tabled(rename = "Duration (s)")]
    duration: String,
    #[tabled(rename = "Notes")]
    notes: String,
}

impl From<&StreamSummary> for StreamRow {
    fn from(s: &StreamSummary) -> Self {
        let mut notes = Vec::new();
        if s.low_confidence {
            notes.push("low confidence".to_string());
        }
        if s.unsupported > 0 {
            notes.push(format!("{} unsupported", s.unsupported));
        }
        StreamRow {
            ssrc: format!("0x{:08X}", s.ssrc),
            source: format!("{}:{}", s.source_ip, s.source_port),
            destination: format!("{}:{}", s.destination_ip, s.destination_port),
            payload_type: s.payload_type,
            codec: format!("{}/{}", s.codec, s.sample_rate),
            packets: s.packets,
            lost: s.lost,
            duplicates: s.duplicates,
            duration: format!("{:.2}", s.duration),
            notes: notes.join(", "),
        }
    }
}

/// One row per stream
pub fn streams(summaries: &[StreamSummary]) -> String {
    let rows: Vec<StreamRow> = summaries.iter().map(StreamRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// One-line run summary
pub fn diagnostics(d: &RunDiagnostics) -> String {
    format!(
        "{} frames: {} RTP, {} other UDP, {} non-UDP, {} dropped; {} streams, {} gaps, {} duplicates",
        d.frames_total,
        d.rtp_packets,
        d.frames_non_rtp,
        d.frames_non_udp,
        d.frames_dropped,
        d.streams,
        d.gaps,
        d.duplicates
    )
}
