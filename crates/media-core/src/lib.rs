//! # Media-Core: RTP stream reconstruction
//!
//! Turns a packet capture into one continuous, time-aligned audio signal
//! per RTP stream.
//!
//! ```text
//! capture bytes -> frames -> RTP packets -> streams -> ordered/gapped
//!               -> decoded segments -> audio artifacts + metadata
//! ```
//!
//! - [`demux`]: partition packets by 5-tuple + SSRC
//! - [`sequencer`]: wraparound-aware ordering, de-duplication, gaps
//! - [`decoder`]: timestamp-driven placement of decoded payloads
//! - [`sink`]: artifacts, WAV/MD5 export, stereo merge
//! - [`engine`]: single-pass ingest, parallel per-stream reconstruction
//! - [`transcription`] and [`session`]: transcription hand-off and live capture
//!
//! ## Usage
//!
//! ```rust
//! use std::net::{Ipv4Addr, SocketAddrV4};
//! use std::time::Duration;
//! use bytes::Bytes;
//! use voipspy_capture_core::PcapWriter;
//! use voipspy_media_core::{EngineConfig, ReconstructionEngine};
//! use voipspy_rtp_core::RtpPacket;
//!
//! let mut capture = PcapWriter::new();
//! for seq in 0..50u16 {
//!     let packet = RtpPacket::new(0, seq, u32::from(seq) * 160, 0xC0FFEE, Bytes::from(vec![0xFF; 160]));
//!     capture.write_udp(
//!         Duration::from_millis(20 * u64::from(seq)),
//!         SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 40000),
//!         SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 40002),
//!         &packet.serialize(),
//!     );
//! }
//!
//! let engine = ReconstructionEngine::new(EngineConfig::default())?;
//! let run = engine.process(capture.into_bytes())?;
//! assert_eq!(run.artifacts.len(), 1);
//! assert_eq!(run.summaries()[0].duration, 1.0);
//! # Ok::<(), voipspy_media_core::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod decoder;
pub mod demux;
pub mod engine;
pub mod error;
pub mod result_table;
pub mod sequencer;
pub mod session;
pub mod sink;
pub mod summary;
pub mod transcription;

pub use config::{
    CaptureConfig, DecoderConfig, EngineConfig, ExportConfig, SequencerConfig, TranscriptionConfig,
};
pub use decoder::{DecodeStats, DecodedSegment, DecodedStream, OutputFormat, SegmentKind, StreamDecoder};
pub use demux::{StreamDemultiplexer, StreamKey, StreamPackets};
pub use engine::{ReconstructionEngine, RunResult, StreamingIngest};
pub use error::{Error, Result};
pub use result_table::ResultTable;
pub use sequencer::{ReassembledStream, SequenceEntry, SequenceStats, Sequencer};
pub use session::{
    CaptureBackend, CaptureHandle, CaptureSessionManager, CompletedSession, SessionInfo, TsharkBackend,
};
pub use sink::{
    digest_samples, encode_wav, export_run, merge_stereo, timestamped_directory, AudioArtifact, AudioSink,
    ExportReport, MergedAudio,
};
pub use summary::{RunDiagnostics, RunMetadata, StreamSummary, SUMMARY_VERSION};
pub use transcription::{write_transcript, HttpTranscriber, Transcriber, TranscriptionService};

/// Version information for the media library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
