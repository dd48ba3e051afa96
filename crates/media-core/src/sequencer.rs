//! Packet ordering, de-duplication and gap detection
//!
//! Packets are unwrapped in arrival order, each relative to the packet
//! that arrived before it, then sorted by extended sequence number. Equal
//! extended numbers keep the earliest arrival. Every hole in the sequence
//! becomes an explicit [`SequenceEntry::Gap`].

use serde::{Deserialize, Serialize};
use tracing::debug;
use voipspy_rtp_core::{RtpPacket, SequenceUnwrapper};

use crate::config::SequencerConfig;
use crate::demux::{StreamKey, StreamPackets};

/// One position of a reassembled stream
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEntry {
    Packet {
        /// Sequence number extended to 64 bits
        extended_seq: i64,
        packet: RtpPacket,
    },
    Gap {
        /// Extended sequence number of the first missing packet
        first_missing: i64,
        /// Number of consecutive missing packets
        missing: u64,
    },
}

/// Ordering statistics of one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStats {
    /// Packets handed to the sequencer
    pub received: u64,
    /// Packets kept after de-duplication
    pub unique: u64,
    pub duplicates: u64,
    /// Number of gap entries
    pub gaps: u64,
    /// Packets missing inside the span
    pub lost: u64,
    /// Packets that arrived after a packet with a higher sequence number
    pub reordered: u64,
    /// Extended sequence numbers covered, first to last inclusive
    pub span: u64,
}

/// A stream in playout order
#[derive(Debug, Clone, PartialEq)]
pub struct ReassembledStream {
    pub key: StreamKey,
    pub entries: Vec<SequenceEntry>,
    pub stats: SequenceStats,
    /// Too short or too disordered to trust as RTP
    pub low_confidence: bool,
}

impl ReassembledStream {
    /// Packets in playout order
    pub fn packets(&self) -> impl Iterator<Item = &RtpPacket> {
        self.entries.iter().filter_map(|entry| match entry {
            SequenceEntry::Packet { packet, .. } => Some(packet),
            SequenceEntry::Gap { .. } => None,
        })
    }

    /// Gap entries as (first missing, count)
    pub fn gaps(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            SequenceEntry::Gap {
                first_missing,
                missing,
            } => Some((*first_missing, *missing)),
            SequenceEntry::Packet { .. } => None,
        })
    }

    /// Packets extracted for another sequencing pass
    pub fn to_packets(&self) -> StreamPackets {
        StreamPackets {
            key: self.key,
            packets: self.packets().cloned().collect(),
        }
    }
}

/// Reorders the packets of one stream
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    config: SequencerConfig,
}

impl Sequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Order, de-duplicate and gap-annotate a stream
    pub fn sequence(&self, stream: StreamPackets) -> ReassembledStream {
        let StreamPackets { key, mut packets } = stream;
        packets.sort_by_key(|packet| (packet.arrival, packet.frame_index));

        let mut stats = SequenceStats {
            received: packets.len() as u64,
            ..SequenceStats::default()
        };

        // Unwrap in arrival order
        let mut unwrapper = SequenceUnwrapper::new();
        let mut highest: Option<i64> = None;
        let mut forward_steps = 0usize;
        let mut repeats = 0usize;
        let mut numbered: Vec<(i64, usize, RtpPacket)> = Vec::with_capacity(packets.len());
        for (arrival_rank, packet) in packets.into_iter().enumerate() {
            let previous = unwrapper.last();
            let extended = unwrapper.unwrap(packet.sequence_number, packet.timestamp);
            if let Some(previous) = previous {
                let step = extended - previous;
                if step == 0 {
                    repeats += 1;
                } else if step > 0 && step <= i64::from(self.config.max_forward_step) {
                    forward_steps += 1;
                }
            }
            match highest {
                Some(max) if extended < max => stats.reordered += 1,
                Some(max) if extended == max => {}
                _ => highest = Some(extended),
            }
            numbered.push((extended, arrival_rank, packet));
        }

        let low_confidence = self.is_low_confidence(numbered.len() - repeats, forward_steps);

        // Playout order; ties keep the earliest arrival first
        numbered.sort_by_key(|(extended, arrival_rank, _)| (*extended, *arrival_rank));

        let mut entries = Vec::with_capacity(numbered.len());
        let mut last: Option<i64> = None;
        let mut first: Option<i64> = None;
        for (extended, _, packet) in numbered {
            match last {
                Some(previous) if previous == extended => {
                    stats.duplicates += 1;
                    continue;
                }
                Some(previous) if extended > previous + 1 => {
                    let missing = (extended - previous - 1) as u64;
                    stats.gaps += 1;
                    stats.lost += missing;
                    entries.push(SequenceEntry::Gap {
                        first_missing: previous + 1,
                        missing,
                    });
                }
                _ => {}
            }
            first.get_or_insert(extended);
            last = Some(extended);
            stats.unique += 1;
            entries.push(SequenceEntry::Packet {
                extended_seq: extended,
                packet,
            });
        }
        if let (Some(first), Some(last)) = (first, last) {
            stats.span = (last - first + 1) as u64;
        }

        debug!(
            "Sequenced {}: {} unique, {} duplicates, {} gaps ({} lost), {} reordered{}",
            key,
            stats.unique,
            stats.duplicates,
            stats.gaps,
            stats.lost,
            stats.reordered,
            if low_confidence { ", low confidence" } else { "" }
        );

        ReassembledStream {
            key,
            entries,
            stats,
            low_confidence,
        }
    }

    /// `packets` counts only arrivals whose sequence number differs from the
    /// previous arrival's
    fn is_low_confidence(&self, packets: usize, forward_steps: usize) -> bool {
        if packets < self.config.min_packets {
            return true;
        }
        if packets < 2 {
            return false;
        }
        let ratio = forward_steps as f64 / (packets - 1) as f64;
        ratio < self.config.min_monotonic_ratio
    }
}
