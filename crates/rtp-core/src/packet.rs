//! RTP packet (RFC 3550 section 5.1)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       sequence number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           synchronization source (SSRC) identifier            |
//! +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
//! |            contributing source (CSRC) identifiers             |
//! |                             ....                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::time::Duration;

use crate::error::Error;
use crate::{Result, RtpCsrc, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP version carried in the first two bits
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed header
pub const RTP_MIN_HEADER_SIZE: usize = 12;

/// Header extension (RFC 3550 section 5.3.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeaderExtension {
    /// Profile-defined identifier
    pub profile: u16,

    /// Extension body, a multiple of four bytes
    pub data: Bytes,
}

/// A parsed RTP packet
///
/// `payload` excludes the CSRC list, header extension and padding.
/// `arrival` and `frame_index` come from the capture frame that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Number of padding bytes that followed the payload
    pub padding: u8,

    /// Marker bit
    pub marker: bool,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Sequence number (wraps)
    pub sequence_number: RtpSequenceNumber,

    /// Media timestamp (wraps)
    pub timestamp: RtpTimestamp,

    /// Synchronization source
    pub ssrc: RtpSsrc,

    /// Contributing sources
    pub csrc: Vec<RtpCsrc>,

    /// Optional header extension
    pub extension: Option<RtpHeaderExtension>,

    /// Media payload
    pub payload: Bytes,

    /// Arrival time on the capture clock
    pub arrival: Duration,

    /// Index of the capture frame that carried the packet
    pub frame_index: u64,
}

impl RtpPacket {
    /// Create a packet with an empty header apart from the given fields
    pub fn new(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        Self {
            padding: 0,
            marker: false,
            payload_type: payload_type & 0x7F,
            sequence_number,
            timestamp,
            ssrc,
            csrc: Vec::new(),
            extension: None,
            payload,
            arrival: Duration::ZERO,
            frame_index: 0,
        }
    }

    /// Set the capture metadata
    pub fn with_arrival(mut self, arrival: Duration, frame_index: u64) -> Self {
        self.arrival = arrival;
        self.frame_index = frame_index;
        self
    }

    /// Parse an RTP packet from a UDP payload
    pub fn parse(data: Bytes) -> Result<Self> {
        let total = data.len();
        if total < RTP_MIN_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                required: RTP_MIN_HEADER_SIZE,
                available: total,
            });
        }

        let mut buf = data.clone();
        let first = buf.get_u8();
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(Error::InvalidVersion(version));
        }
        let has_padding = first & 0x20 != 0;
        let has_extension = first & 0x10 != 0;
        let csrc_count = usize::from(first & 0x0F);

        let second = buf.get_u8();
        let marker = second & 0x80 != 0;
        let payload_type = second & 0x7F;
        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        let mut header_len = RTP_MIN_HEADER_SIZE + csrc_count * 4;
        if total < header_len {
            return Err(Error::BufferTooSmall {
                required: header_len,
                available: total,
            });
        }
        let csrc = (0..csrc_count).map(|_| buf.get_u32()).collect();

        let extension = if has_extension {
            if total < header_len + 4 {
                return Err(Error::BufferTooSmall {
                    required: header_len + 4,
                    available: total,
                });
            }
            let profile = buf.get_u16();
            let words = usize::from(buf.get_u16());
            header_len += 4 + words * 4;
            if total < header_len {
                return Err(Error::BufferTooSmall {
                    required: header_len,
                    available: total,
                });
            }
            Some(RtpHeaderExtension {
                profile,
                data: buf.split_to(words * 4),
            })
        } else {
            None
        };

        let mut payload_end = total;
        let mut padding = 0u8;
        if has_padding {
            padding = data[total - 1];
            let available = total - header_len;
            if padding == 0 || usize::from(padding) > available {
                return Err(Error::InvalidPadding {
                    padding: usize::from(padding),
                    available,
                });
            }
            payload_end -= usize::from(padding);
        }

        Ok(Self {
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload: data.slice(header_len..payload_end),
            arrival: Duration::ZERO,
            frame_index: 0,
        })
    }

    /// Header size including CSRC list and extension
    pub fn header_size(&self) -> usize {
        let extension = self
            .extension
            .as_ref()
            .map(|ext| 4 + ext.data.len())
            .unwrap_or(0);
        RTP_MIN_HEADER_SIZE + self.csrc.len() * 4 + extension
    }

    /// Serialized size
    pub fn size(&self) -> usize {
        self.header_size() + self.payload.len() + usize::from(self.padding)
    }

    /// Serialize to wire format
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());

        let mut first = RTP_VERSION << 6;
        if self.padding > 0 {
            first |= 0x20;
        }
        if self.extension.is_some() {
            first |= 0x10;
        }
        first |= (self.csrc.len().min(15)) as u8;
        buf.put_u8(first);
        buf.put_u8((u8::from(self.marker) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in self.csrc.iter().take(15) {
            buf.put_u32(*csrc);
        }
        if let Some(ext) = &self.extension {
            buf.put_u16(ext.profile);
            buf.put_u16((ext.data.len() / 4) as u16);
            buf.put_slice(&ext.data);
        }
        buf.put_slice(&self.payload);
        if self.padding > 0 {
            buf.put_bytes(0, usize::from(self.padding) - 1);
            buf.put_u8(self.padding);
        }
        buf.freeze()
    }
}
