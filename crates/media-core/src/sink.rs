//! Audio sink: artifacts, WAV output and run export
//!
//! An [`AudioArtifact`] is built once from a decoded stream and never
//! changes afterwards. Its samples sit behind an `Arc<[i16]>`, so exports
//! and transcription can share them without copying.

use chrono::Local;
use hound::{SampleFormat, WavSpec, WavWriter};
use md5::{Digest, Md5};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio;
use crate::config::ExportConfig;
use crate::decoder::DecodedStream;
use crate::demux::StreamKey;
use crate::error::Result;
use crate::sequencer::ReassembledStream;
use crate::summary::{RunDiagnostics, RunMetadata, StreamSummary};

/// Name of the run metadata file
pub const METADATA_FILE: &str = "metadata.json";

/// Name of the stereo mix
pub const MERGED_FILE: &str = "merged_audio.wav";

fn wav_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Encode interleaved samples as a 16-bit PCM WAV file in memory
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, wav_spec(sample_rate, channels))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Write interleaved samples to a 16-bit PCM WAV file
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let mut writer = WavWriter::create(path, wav_spec(sample_rate, channels))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// MD5 of the samples in little-endian byte order, lowercase hex
pub fn digest_samples(samples: &[i16]) -> String {
    let mut hasher = Md5::new();
    for sample in samples {
        hasher.update(sample.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Final audio of one stream
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    key: StreamKey,
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
    summary: StreamSummary,
}

impl AudioArtifact {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Shared handle to the samples
    pub fn shared_samples(&self) -> Arc<[i16]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    /// Content digest of the samples
    pub fn digest(&self) -> &str {
        &self.summary.digest
    }

    /// Length in frames
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Exact duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate, self.channels)
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        write_wav(path, &self.samples, self.sample_rate, self.channels)
    }
}

/// Builds artifacts from decoded streams
pub struct AudioSink;

impl AudioSink {
    /// Concatenate a stream's segments in timeline order
    pub fn assemble(stream: &ReassembledStream, mut decoded: DecodedStream) -> AudioArtifact {
        decoded.segments.sort_by_key(|segment| segment.start);
        let total: usize = decoded.segments.iter().map(|s| s.samples.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for segment in &decoded.segments {
            samples.extend_from_slice(&segment.samples);
        }

        let digest = digest_samples(&samples);
        let summary = StreamSummary::new(stream, &decoded, digest);
        debug!("Artifact {}: {:.2}s, digest {}", stream.key, summary.duration, summary.digest);

        AudioArtifact {
            key: stream.key,
            samples: samples.into(),
            sample_rate: decoded.format.sample_rate,
            channels: decoded.format.channels,
            summary,
        }
    }
}

/// Stereo mix of two artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAudio {
    /// Interleaved left/right samples
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl MergedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate, 2)
    }

    pub fn write_wav(&self, path: &Path) -> Result<()> {
        write_wav(path, &self.samples, self.sample_rate, 2)
    }
}

/// Left = `left`, right = `right` resampled to the left rate; the longer
/// side is truncated
pub fn merge_stereo(left: &AudioArtifact, right: &AudioArtifact) -> MergedAudio {
    let sample_rate = left.sample_rate();
    let left_mono = audio::remix(left.samples(), left.channels(), 1);
    let right_mono = audio::convert(right.samples(), right.channels(), right.sample_rate(), 1, sample_rate);

    let frames = left_mono.len().min(right_mono.len());
    let mut samples = Vec::with_capacity(frames * 2);
    for (l, r) in left_mono.iter().zip(&right_mono) {
        samples.push(*l);
        samples.push(*r);
    }
    MergedAudio {
        samples,
        sample_rate,
    }
}

/// `base/YYYYmmdd_HHMMSS`
pub fn timestamped_directory(base: &Path) -> PathBuf {
    base.join(Local::now().format("%Y%m%d_%H%M%S").to_string())
}

/// What [`export_run`] wrote
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub directory: PathBuf,
    /// WAV files, one per exported stream
    pub files: Vec<PathBuf>,
    pub exported: Vec<StreamSummary>,
    pub metadata: PathBuf,
    pub merged: Option<PathBuf>,
    /// Streams below `min_duration_secs`
    pub skipped_short: usize,
    /// Streams whose samples equal an earlier stream's
    pub skipped_duplicate: usize,
}

/// Write WAV files, `metadata.json` and optionally the stereo mix
///
/// File names are `<prefix>_<ssrc>.wav`; a repeated SSRC gets a `_<n>`
/// suffix. `metadata.json` lists the exported streams only.
pub fn export_run(
    artifacts: &[AudioArtifact],
    diagnostics: &RunDiagnostics,
    directory: &Path,
    config: &ExportConfig,
) -> Result<ExportReport> {
    fs::create_dir_all(directory)?;
    let mut report = ExportReport {
        directory: directory.to_path_buf(),
        metadata: directory.join(METADATA_FILE),
        ..ExportReport::default()
    };

    let mut digests = HashSet::new();
    let mut ssrc_uses: HashMap<u32, usize> = HashMap::new();
    let mut exported: Vec<&AudioArtifact> = Vec::new();
    for artifact in artifacts {
        if artifact.duration_secs() < config.min_duration_secs {
            debug!("Skipping {}: {:.2}s is below the minimum", artifact.key(), artifact.duration_secs());
            report.skipped_short += 1;
            continue;
        }
        if config.deduplicate && !digests.insert(artifact.digest().to_string()) {
            debug!("Skipping {}: identical to an exported stream", artifact.key());
            report.skipped_duplicate += 1;
            continue;
        }

        let ssrc = artifact.key().ssrc;
        let uses = ssrc_uses.entry(ssrc).or_default();
        let name = if *uses == 0 {
            format!("{}_{}.wav", config.file_prefix, ssrc)
        } else {
            format!("{}_{}_{}.wav", config.file_prefix, ssrc, uses)
        };
        *uses += 1;

        let path = directory.join(name);
        artifact.write_wav(&path)?;
        report.files.push(path);
        report.exported.push(artifact.summary().clone());
        exported.push(artifact);
    }

    let metadata = RunMetadata::new(report.exported.clone(), *diagnostics);
    fs::write(&report.metadata, metadata.to_json_pretty()?)?;

    if config.merge {
        if let [left, right, ..] = exported.as_slice() {
            let path = directory.join(MERGED_FILE);
            merge_stereo(left, right).write_wav(&path)?;
            report.merged = Some(path);
        }
    }

    info!(
        "Exported {} streams to {} ({} too short, {} duplicates)",
        report.files.len(),
        directory.display(),
        report.skipped_short,
        report.skipped_duplicate
    );
    Ok(report)
}
