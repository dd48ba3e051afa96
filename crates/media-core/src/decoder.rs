//! Stream decoding: payloads to a time-aligned sample timeline
//!
//! Placement is driven by RTP timestamps. Each packet's timestamp, unwrapped
//! and converted from the codec clock to output samples, gives the position
//! it should start at. Gaps are filled with silence of the stream's typical
//! packet duration, and any remaining mismatch between the expected
//! position and the end of the timeline is corrected by padding silence
//! (packet ahead) or clipping the overlapping prefix (packet behind). A
//! jump larger than `max_silence_fill_ms` in either direction rebases the
//! timeline onto the packet instead.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};
use voipspy_codec_core::{AudioDecoder, PayloadFormat, PayloadTypeRegistry};
use voipspy_rtp_core::time::{clock_rates, ticks_to_samples};
use voipspy_rtp_core::{timestamp_delta, RtpPacket, TimestampUnwrapper};

use crate::audio;
use crate::config::DecoderConfig;
use crate::demux::StreamKey;
use crate::sequencer::{ReassembledStream, SequenceEntry};

/// Origin of a run of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Decoded payload
    Audio,
    /// Fill for missing sequence numbers
    GapSilence,
    /// Fill for a packet that could not be decoded
    UnsupportedSilence,
    /// Padding up to a packet whose timestamp lies ahead of the timeline
    AlignmentSilence,
}

/// Contiguous run of interleaved samples
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSegment {
    pub kind: SegmentKind,
    /// Position in the stream timeline, in frames (samples per channel)
    pub start: u64,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedSegment {
    /// Length in frames
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

/// Format of a decoded stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    /// Primary payload type, if any payload type was recognised
    pub payload_type: Option<u8>,
    pub codec: String,
    pub clock_rate: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputFormat {
    fn from_payload(format: &PayloadFormat) -> Self {
        Self {
            payload_type: Some(format.payload_type),
            codec: format.codec.name().to_string(),
            clock_rate: format.clock_rate,
            sample_rate: format.sample_rate,
            channels: u16::from(format.channels),
        }
    }

    fn fallback() -> Self {
        Self {
            payload_type: None,
            codec: "unknown".to_string(),
            clock_rate: clock_rates::AUDIO_8KHZ,
            sample_rate: clock_rates::AUDIO_8KHZ,
            channels: 1,
        }
    }
}

/// Per-stream decoding counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub audio_packets: u64,
    /// Comfort noise and telephone-event packets
    pub signalling_packets: u64,
    /// Packets of unknown or undecodable payload types
    pub unsupported_packets: u64,
    pub decode_errors: u64,
    /// Frames of inserted silence (gap, unsupported and alignment fill)
    pub silence_frames: u64,
    /// Frames dropped because they overlapped the timeline
    pub clipped_frames: u64,
    /// Timeline rebases after an oversized timestamp jump
    pub resyncs: u64,
}

/// Result of decoding one stream
#[derive(Debug, Clone)]
pub struct DecodedStream {
    pub key: StreamKey,
    pub format: OutputFormat,
    pub segments: Vec<DecodedSegment>,
    /// Distinct payload types seen, ascending
    pub payload_types: Vec<u8>,
    pub stats: DecodeStats,
}

impl DecodedStream {
    /// Timeline length in frames
    pub fn frames(&self) -> u64 {
        self.segments.iter().map(|s| s.frames() as u64).sum()
    }
}

enum PacketAudio {
    Samples(Vec<i16>),
    /// Recognised payload without samples (CN, events)
    Signalling,
    /// Undecodable; its time span becomes silence
    Silence,
}

/// Decodes reassembled streams with a shared payload type registry
pub struct StreamDecoder<'a> {
    registry: &'a PayloadTypeRegistry,
    config: &'a DecoderConfig,
}

impl<'a> StreamDecoder<'a> {
    pub fn new(registry: &'a PayloadTypeRegistry, config: &'a DecoderConfig) -> Self {
        Self { registry, config }
    }

    /// Pick the output format of a stream
    ///
    /// The most frequent decodable audio payload type wins; failing that the
    /// most frequent recognised one; failing that 8 kHz mono. Ties go to the
    /// payload type seen first.
    pub fn primary_format(&self, stream: &ReassembledStream) -> Option<PayloadFormat> {
        let mut counts: Vec<(u8, u64)> = Vec::new();
        for packet in stream.packets() {
            match counts.iter_mut().find(|(pt, _)| *pt == packet.payload_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((packet.payload_type, 1)),
            }
        }

        let most_frequent = |accept: &dyn Fn(&PayloadFormat) -> bool| {
            let mut best: Option<(PayloadFormat, u64)> = None;
            for &(pt, count) in &counts {
                if let Some(format) = self.registry.get(pt).filter(|f| accept(f)) {
                    if best.map_or(true, |(_, best_count)| count > best_count) {
                        best = Some((*format, count));
                    }
                }
            }
            best.map(|(format, _)| format)
        };

        most_frequent(&|f| f.codec.is_decodable() && f.codec.carries_audio())
            .or_else(|| most_frequent(&|f| f.codec.carries_audio()))
            .or_else(|| most_frequent(&|_| true))
    }

    /// Decode a stream into time-aligned segments
    pub fn decode(&self, stream: &ReassembledStream) -> DecodedStream {
        let primary = self.primary_format(stream);
        let format = primary
            .as_ref()
            .map_or_else(OutputFormat::fallback, OutputFormat::from_payload);
        let typical = primary
            .as_ref()
            .and_then(|primary| typical_frame(stream, primary));
        let default_frames = primary.as_ref().map_or(
            (format.sample_rate as usize) / 50,
            PayloadFormat::default_frame_samples,
        );
        let max_fill = i64::from(format.sample_rate) * i64::from(self.config.max_silence_fill_ms) / 1000;

        debug!(
            "Decoding {} as {}/{} ({} ch), typical frame {:?}",
            stream.key, format.codec, format.sample_rate, format.channels, typical
        );

        let mut timeline = Timeline::new(&format);
        let mut stats = DecodeStats::default();
        let mut payload_types = BTreeSet::new();
        let mut decoders: HashMap<u8, Option<Box<dyn AudioDecoder>>> = HashMap::new();
        let mut timestamps = TimestampUnwrapper::new();
        let mut base: Option<i64> = None;
        let mut offset = 0i64;
        let mut last_frames: Option<usize> = None;

        for entry in &stream.entries {
            let packet = match entry {
                SequenceEntry::Gap { missing, .. } => {
                    let frame = typical.or(last_frames).unwrap_or(default_frames) as i64;
                    let fill = (*missing as i64).saturating_mul(frame).min(max_fill);
                    stats.silence_frames += timeline.silence(SegmentKind::GapSilence, fill);
                    continue;
                }
                SequenceEntry::Packet { packet, .. } => packet,
            };
            payload_types.insert(packet.payload_type);

            let timestamp = timestamps.unwrap(packet.timestamp);
            let base = *base.get_or_insert(timestamp);
            let clock = self
                .registry
                .get(packet.payload_type)
                .map_or(format.clock_rate, |f| f.clock_rate);
            let expected = offset + ticks_to_samples(timestamp - base, clock, format.sample_rate);
            let mut drift = expected - timeline.cursor;
            if drift.abs() > max_fill {
                debug!(
                    "{}: timestamp jump of {} frames at seq {}, rebasing",
                    stream.key, drift, packet.sequence_number
                );
                offset -= drift;
                drift = 0;
                stats.resyncs += 1;
            }
            if drift > 0 {
                stats.silence_frames += timeline.silence(SegmentKind::AlignmentSilence, drift);
            }
            let overlap = (-drift).max(0) as usize;

            match self.decode_packet(&mut decoders, packet, &format, &mut stats) {
                PacketAudio::Samples(samples) => {
                    let channels = usize::from(format.channels.max(1));
                    let frames = samples.len() / channels;
                    last_frames = Some(frames);
                    let clipped = overlap.min(frames);
                    stats.clipped_frames += clipped as u64;
                    timeline.audio(samples[clipped * channels..].to_vec());
                }
                PacketAudio::Signalling => {}
                PacketAudio::Silence => {
                    let frames = typical.or(last_frames).unwrap_or(default_frames);
                    let clipped = overlap.min(frames);
                    stats.clipped_frames += clipped as u64;
                    stats.silence_frames +=
                        timeline.silence(SegmentKind::UnsupportedSilence, (frames - clipped) as i64);
                }
            }
        }

        if stats.unsupported_packets > 0 || stats.decode_errors > 0 {
            warn!(
                "{}: {} unsupported and {} undecodable packets replaced by silence",
                stream.key, stats.unsupported_packets, stats.decode_errors
            );
        }

        DecodedStream {
            key: stream.key,
            format,
            segments: timeline.segments,
            payload_types: payload_types.into_iter().collect(),
            stats,
        }
    }

    fn decode_packet(
        &self,
        decoders: &mut HashMap<u8, Option<Box<dyn AudioDecoder>>>,
        packet: &RtpPacket,
        output: &OutputFormat,
        stats: &mut DecodeStats,
    ) -> PacketAudio {
        let payload_type = packet.payload_type;
        let slot = decoders.entry(payload_type).or_insert_with(|| {
            match self.registry.create_decoder(payload_type) {
                Ok(decoder) => Some(decoder),
                Err(err) => {
                    debug!("No decoder for payload type {}: {}", payload_type, err);
                    None
                }
            }
        });
        let Some(decoder) = slot.as_mut() else {
            stats.unsupported_packets += 1;
            return PacketAudio::Silence;
        };

        match decoder.decode(&packet.payload) {
            Ok(samples) if samples.is_empty() => {
                stats.signalling_packets += 1;
                PacketAudio::Signalling
            }
            Ok(samples) => {
                stats.audio_packets += 1;
                let info = decoder.info();
                PacketAudio::Samples(audio::convert(
                    &samples,
                    u16::from(info.channels),
                    info.sample_rate,
                    output.channels,
                    output.sample_rate,
                ))
            }
            Err(err) => {
                debug!("Seq {}: {}", packet.sequence_number, err);
                stats.decode_errors += 1;
                PacketAudio::Silence
            }
        }
    }
}

/// Most common timestamp step between consecutive packets of the primary
/// payload type, in output frames
fn typical_frame(stream: &ReassembledStream, primary: &PayloadFormat) -> Option<usize> {
    let mut steps: HashMap<i64, usize> = HashMap::new();
    let mut previous: Option<(i64, &RtpPacket)> = None;
    for entry in &stream.entries {
        let SequenceEntry::Packet { extended_seq, packet } = entry else {
            previous = None;
            continue;
        };
        if packet.payload_type != primary.payload_type {
            previous = None;
            continue;
        }
        if let Some((last_seq, last)) = previous {
            let step = timestamp_delta(last.timestamp, packet.timestamp);
            if *extended_seq == last_seq + 1 && step > 0 {
                *steps.entry(step).or_default() += 1;
            }
        }
        previous = Some((*extended_seq, packet));
    }

    let (step, _) = steps
        .into_iter()
        .max_by_key(|&(step, count)| (count, std::cmp::Reverse(step)))?;
    let frames = ticks_to_samples(step, primary.clock_rate, primary.sample_rate);
    usize::try_from(frames).ok().filter(|&frames| frames > 0)
}

/// Append-only sample timeline
struct Timeline {
    segments: Vec<DecodedSegment>,
    cursor: i64,
    sample_rate: u32,
    channels: u16,
}

impl Timeline {
    fn new(format: &OutputFormat) -> Self {
        Self {
            segments: Vec::new(),
            cursor: 0,
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }

    fn push(&mut self, kind: SegmentKind, samples: Vec<i16>) -> u64 {
        let frames = samples.len() / usize::from(self.channels.max(1));
        if frames == 0 {
            return 0;
        }
        self.segments.push(DecodedSegment {
            kind,
            start: self.cursor as u64,
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        });
        self.cursor += frames as i64;
        frames as u64
    }

    fn silence(&mut self, kind: SegmentKind, frames: i64) -> u64 {
        if frames <= 0 {
            return 0;
        }
        let len = frames as usize * usize::from(self.channels.max(1));
        self.push(kind, vec![0; len])
    }

    fn audio(&mut self, samples: Vec<i16>) {
        self.push(SegmentKind::Audio, samples);
    }
}
