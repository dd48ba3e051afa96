//! Reconstruction engine
//!
//! One forward pass parses, classifies and demultiplexes the capture. After
//! that every stream is independent: rayon workers sequence, decode and
//! assemble streams in parallel and record the artifacts in a write-once
//! [`ResultTable`].

use bytes::Bytes;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, trace};
use voipspy_capture_core::{CaptureFrame, CaptureReader, FrameStats};
use voipspy_codec_core::PayloadTypeRegistry;
use voipspy_rtp_core::RtpClassifier;

use crate::config::EngineConfig;
use crate::decoder::StreamDecoder;
use crate::demux::{StreamDemultiplexer, StreamKey, StreamPackets};
use crate::error::Result;
use crate::result_table::ResultTable;
use crate::sequencer::Sequencer;
use crate::sink::{AudioArtifact, AudioSink};
use crate::summary::{RunDiagnostics, RunMetadata, StreamSummary};

/// Everything one capture produced
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    /// Artifacts in order of first appearance
    pub artifacts: Vec<AudioArtifact>,
    pub diagnostics: RunDiagnostics,
}

impl RunResult {
    /// Summaries in order of first appearance
    pub fn summaries(&self) -> Vec<StreamSummary> {
        self.artifacts.iter().map(|a| a.summary().clone()).collect()
    }

    pub fn artifact(&self, key: &StreamKey) -> Option<&AudioArtifact> {
        self.artifacts.iter().find(|a| a.key() == key)
    }

    pub fn metadata(&self) -> RunMetadata {
        RunMetadata::new(self.summaries(), self.diagnostics)
    }
}

/// Turns captures into per-stream audio
pub struct ReconstructionEngine {
    config: EngineConfig,
    registry: PayloadTypeRegistry,
    classifier: RtpClassifier,
    sequencer: Sequencer,
}

impl ReconstructionEngine {
    /// Create an engine; fails on invalid configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = config.decoder.registry()?;
        Ok(Self {
            classifier: RtpClassifier::new(config.classifier.clone()),
            sequencer: Sequencer::new(config.sequencer.clone()),
            registry,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &PayloadTypeRegistry {
        &self.registry
    }

    /// Process a capture held in memory
    ///
    /// # Errors
    ///
    /// Only a malformed capture header is fatal; bad frames are counted.
    pub fn process(&self, data: impl Into<Bytes>) -> Result<RunResult> {
        let reader = CaptureReader::new(data)?;
        debug!("Processing {:?} capture", reader.format());

        let mut frames = reader.frames();
        let mut ingest = self.ingest();
        for item in frames.by_ref() {
            match item {
                Ok(frame) => ingest.push(&frame),
                Err(err) if err.is_recoverable() => trace!("Frame skipped: {}", err),
                Err(err) => return Err(err.into()),
            }
        }
        ingest.finish(frames.stats())
    }

    /// Process a capture file
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<RunResult> {
        let path = path.as_ref();
        info!("Reading capture {}", path.display());
        let data = std::fs::read(path)?;
        self.process(data)
    }

    /// Start an incremental run
    pub fn ingest(&self) -> StreamingIngest<'_> {
        StreamingIngest {
            engine: self,
            demux: StreamDemultiplexer::new(),
            rtp_packets: 0,
            non_rtp: 0,
        }
    }

    /// Sequence, decode and assemble one stream
    pub fn reconstruct(&self, stream: StreamPackets) -> AudioArtifact {
        let reassembled = self.sequencer.sequence(stream);
        let decoded = StreamDecoder::new(&self.registry, &self.config.decoder).decode(&reassembled);
        AudioSink::assemble(&reassembled, decoded)
    }

    fn reconstruct_all(&self, streams: Vec<StreamPackets>) -> Result<Vec<AudioArtifact>> {
        let order: Vec<StreamKey> = streams.iter().map(|s| s.key).collect();
        let table = ResultTable::with_capacity(streams.len());
        streams.into_par_iter().try_for_each(|stream| {
            let key = stream.key;
            table.record(key, self.reconstruct(stream))
        })?;
        Ok(table.into_ordered(&order))
    }
}

/// Incremental front end: frames go in one at a time, streams close at
/// [`StreamingIngest::finish`]
pub struct StreamingIngest<'e> {
    engine: &'e ReconstructionEngine,
    demux: StreamDemultiplexer,
    rtp_packets: u64,
    non_rtp: u64,
}

impl StreamingIngest<'_> {
    /// Classify a UDP frame and file it under its stream
    pub fn push(&mut self, frame: &CaptureFrame) {
        match self.engine.classifier.classify(frame) {
            Ok(packet) => {
                self.rtp_packets += 1;
                let key = StreamKey::new(frame, packet.ssrc);
                self.demux.push(key, packet);
            }
            Err(reason) => {
                trace!("Frame #{} is not RTP: {}", frame.index, reason);
                self.non_rtp += 1;
            }
        }
    }

    /// Streams discovered so far
    pub fn streams(&self) -> usize {
        self.demux.len()
    }

    /// Close all streams and reconstruct them
    ///
    /// `frames` are the parser's counters for the frames pushed.
    pub fn finish(self, frames: FrameStats) -> Result<RunResult> {
        let streams = self.demux.finish();
        let artifacts = self.engine.reconstruct_all(streams)?;

        let mut diagnostics = RunDiagnostics {
            frames_total: frames.total,
            frames_dropped: frames.dropped,
            frames_non_udp: frames.non_udp,
            frames_non_rtp: self.non_rtp,
            rtp_packets: self.rtp_packets,
            ..RunDiagnostics::default()
        };
        for artifact in &artifacts {
            diagnostics.add_stream(artifact.summary());
        }

        info!(
            "Reconstructed {} streams from {} frames ({} RTP, {} non-RTP UDP, {} non-UDP, {} dropped)",
            diagnostics.streams,
            diagnostics.frames_total,
            diagnostics.rtp_packets,
            diagnostics.frames_non_rtp,
            diagnostics.frames_non_udp,
            diagnostics.frames_dropped
        );
        Ok(RunResult {
            artifacts,
            diagnostics,
        })
    }
}
