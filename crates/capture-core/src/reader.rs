//! Capture reader: container detection and the lazy frame iterator

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{CaptureError, Result};
use crate::frame::{CaptureFrame, RawRecord};
use crate::link::decode_udp;
use crate::pcap::{PcapHeader, PcapRecords};
use crate::pcapng::{is_pcapng, PcapngRecords};

/// Container format of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap,
    Pcapng,
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcap => write!(f, "pcap"),
            Self::Pcapng => write!(f, "pcapng"),
        }
    }
}

/// Frame counters maintained by [`Frames`]
///
/// Once the iterator is exhausted `total == udp + non_udp + dropped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Every record seen, including dropped ones
    pub total: u64,
    /// Frames forwarded as UDP datagrams
    pub udp: u64,
    /// Frames carrying something other than UDP (or an undecodable link type)
    pub non_udp: u64,
    /// Truncated frames and frames with inconsistent headers
    pub dropped: u64,
}

#[derive(Clone)]
enum Records {
    Pcap(PcapRecords),
    Pcapng(PcapngRecords),
}

impl Iterator for Records {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Pcap(records) => records.next(),
            Self::Pcapng(records) => records.next(),
        }
    }
}

/// An opened capture buffer
///
/// Opening validates the global (or first section) header; frames are
/// decoded lazily by [`CaptureReader::frames`].
#[derive(Clone)]
pub struct CaptureReader {
    format: CaptureFormat,
    records: Records,
}

impl CaptureReader {
    /// Open a capture held in memory
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        let (format, records) = if is_pcapng(&data) {
            (CaptureFormat::Pcapng, Records::Pcapng(PcapngRecords::new(data)?))
        } else {
            let header = PcapHeader::parse(&data)?;
            debug!(
                "pcap capture v{}.{}, link type {}, {} timestamps",
                header.version_major,
                header.version_minor,
                header.link_type,
                if header.nanosecond { "ns" } else { "µs" }
            );
            (CaptureFormat::Pcap, Records::Pcap(PcapRecords::new(header, data)))
        };
        Ok(Self { format, records })
    }

    /// Read a capture file into memory and open it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::new(data)
    }

    /// Detected container format
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Iterate the UDP frames of the capture from the beginning
    pub fn frames(&self) -> Frames {
        Frames {
            records: self.records.clone(),
            stats: FrameStats::default(),
        }
    }
}

impl IntoIterator for CaptureReader {
    type Item = Result<CaptureFrame>;
    type IntoIter = Frames;

    fn into_iter(self) -> Self::IntoIter {
        Frames {
            records: self.records,
            stats: FrameStats::default(),
        }
    }
}

/// Lazy iterator over the UDP frames of a capture
///
/// Non-UDP frames are skipped and counted. Dropped frames are yielded as
/// recoverable errors so callers can report them; iteration continues
/// afterwards wherever the container framing allows.
pub struct Frames {
    records: Records,
    stats: FrameStats,
}

impl Frames {
    /// Counters for everything consumed so far
    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

impl Iterator for Frames {
    type Item = Result<CaptureFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(err) => {
                    self.stats.total += 1;
                    self.stats.dropped += 1;
                    warn!("dropping frame: {}", err);
                    return Some(Err(err));
                }
            };
            self.stats.total += 1;

            match decode_udp(record.link_type, &record.data) {
                Ok(Some(datagram)) => {
                    self.stats.udp += 1;
                    return Some(Ok(CaptureFrame::new(&record, datagram)));
                }
                Ok(None) => {
                    self.stats.non_udp += 1;
                }
                Err(reason) => {
                    self.stats.dropped += 1;
                    let err = if record.original_len > record.data.len() {
                        CaptureError::TruncatedFrame {
                            index: record.index,
                            declared: record.original_len,
                            available: record.data.len(),
                        }
                    } else {
                        CaptureError::malformed_frame(record.index, reason)
                    };
                    warn!("dropping frame: {}", err);
                    return Some(Err(err));
                }
            }
        }
    }
}
