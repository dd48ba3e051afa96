//! Classic libpcap container
//!
//! ```text
//! global header (24 bytes)
//!   magic | version major | version minor | thiszone | sigfigs | snaplen | linktype
//! record header (16 bytes) + incl_len bytes, repeated
//!   ts_sec | ts_frac | incl_len | orig_len
//! ```
//!
//! The magic number selects byte order and timestamp resolution.

use bytes::Bytes;
use std::time::Duration;

use crate::error::{CaptureError, Result};
use crate::frame::{LinkType, RawRecord};
use crate::Endian;

/// Microsecond-resolution magic as written by the capturing host
pub const PCAP_MAGIC_MICROS: u32 = 0xA1B2_C3D4;
/// Nanosecond-resolution magic as written by the capturing host
pub const PCAP_MAGIC_NANOS: u32 = 0xA1B2_3C4D;

pub(crate) const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// Largest record accepted; anything larger means the framing is corrupt
pub const MAX_RECORD_LEN: usize = 256 * 1024;

/// Parsed global header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcapHeader {
    pub endian: Endian,
    pub nanosecond: bool,
    pub version_major: u16,
    pub version_minor: u16,
    pub snaplen: u32,
    pub link_type: LinkType,
}

impl PcapHeader {
    /// Parse the 24-byte global header
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < GLOBAL_HEADER_LEN {
            return Err(CaptureError::malformed_capture(format!(
                "pcap global header needs {} bytes, got {}",
                GLOBAL_HEADER_LEN,
                data.len()
            )));
        }

        let (endian, nanosecond) = match (
            u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
        ) {
            (PCAP_MAGIC_MICROS, _) => (Endian::Little, false),
            (PCAP_MAGIC_NANOS, _) => (Endian::Little, true),
            (_, PCAP_MAGIC_MICROS) => (Endian::Big, false),
            (_, PCAP_MAGIC_NANOS) => (Endian::Big, true),
            (other, _) => {
                return Err(CaptureError::malformed_capture(format!(
                    "unrecognized pcap magic 0x{:08x}",
                    other
                )))
            }
        };

        let version_major = endian.u16(&data[4..6]);
        let version_minor = endian.u16(&data[6..8]);
        if version_major != 2 {
            return Err(CaptureError::malformed_capture(format!(
                "unsupported pcap version {}.{}",
                version_major, version_minor
            )));
        }

        // The upper bits of the link type field carry FCS information
        let link_type = LinkType::from_code(endian.u32(&data[20..24]) & 0x0FFF_FFFF);

        Ok(Self {
            endian,
            nanosecond,
            version_major,
            version_minor,
            snaplen: endian.u32(&data[16..20]),
            link_type,
        })
    }
}

/// Iterates the records of a classic pcap file
#[derive(Clone)]
pub struct PcapRecords {
    header: PcapHeader,
    data: Bytes,
    offset: usize,
    next_index: u64,
    done: bool,
}

impl PcapRecords {
    pub(crate) fn new(header: PcapHeader, data: Bytes) -> Self {
        Self {
            header,
            data,
            offset: GLOBAL_HEADER_LEN,
            next_index: 1,
            done: false,
        }
    }

    /// The global header this iterator was opened with
    pub fn header(&self) -> &PcapHeader {
        &self.header
    }
}

impl Iterator for PcapRecords {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;

        let remaining = self.data.len() - self.offset;
        if remaining < RECORD_HEADER_LEN {
            self.done = true;
            return Some(Err(CaptureError::TruncatedFrame {
                index,
                declared: RECORD_HEADER_LEN,
                available: remaining,
            }));
        }

        let endian = self.header.endian;
        let header = &self.data[self.offset..self.offset + RECORD_HEADER_LEN];
        let ts_sec = endian.u32(&header[0..4]);
        let ts_frac = endian.u32(&header[4..8]);
        let incl_len = endian.u32(&header[8..12]) as usize;
        let orig_len = endian.u32(&header[12..16]) as usize;

        let available = remaining - RECORD_HEADER_LEN;
        if incl_len > available || incl_len > MAX_RECORD_LEN {
            // Record framing is lost from here on
            self.done = true;
            return Some(Err(CaptureError::TruncatedFrame {
                index,
                declared: incl_len,
                available,
            }));
        }

        let start = self.offset + RECORD_HEADER_LEN;
        self.offset = start + incl_len;

        let nanos = if self.header.nanosecond {
            ts_frac.min(999_999_999)
        } else {
            ts_frac.min(999_999).saturating_mul(1_000)
        };

        Some(Ok(RawRecord {
            index,
            timestamp: Duration::new(u64::from(ts_sec), nanos),
            link_type: self.header.link_type,
            original_len: orig_len,
            data: self.data.slice(start..start + incl_len),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(magic: [u8; 4], endian: Endian) -> Vec<u8> {
        let mut data = magic.to_vec();
        match endian {
            Endian::Little => {
                data.extend_from_slice(&2u16.to_le_bytes());
                data.extend_from_slice(&4u16.to_le_bytes());
                data.extend_from_slice(&[0u8; 8]);
                data.extend_from_slice(&65535u32.to_le_bytes());
                data.extend_from_slice(&1u32.to_le_bytes());
            }
            Endian::Big => {
                data.extend_from_slice(&2u16.to_be_bytes());
                data.extend_from_slice(&4u16.to_be_bytes());
                data.extend_from_slice(&[0u8; 8]);
                data.extend_from_slice(&65535u32.to_be_bytes());
                data.extend_from_slice(&1u32.to_be_bytes());
            }
        }
        data
    }

    #[test]
    fn test_all_magics() {
        let le_micro = PcapHeader::parse(&header([0xD4, 0xC3, 0xB2, 0xA1], Endian::Little)).unwrap();
        assert_eq!(le_micro.endian, Endian::Little);
        assert!(!le_micro.nanosecond);
        assert_eq!(le_micro.link_type, LinkType::Ethernet);

        let le_nano = PcapHeader::parse(&header([0x4D, 0x3C, 0xB2, 0xA1], Endian::Little)).unwrap();
        assert!(le_nano.nanosecond);

        let be_micro = PcapHeader::parse(&header([0xA1, 0xB2, 0xC3, 0xD4], Endian::Big)).unwrap();
        assert_eq!(be_micro.endian, Endian::Big);
        assert_eq!(be_micro.snaplen, 65535);

        let be_nano = PcapHeader::parse(&header([0xA1, 0xB2, 0x3C, 0x4D], Endian::Big)).unwrap();
        assert!(be_nano.nanosecond);
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let err = PcapHeader::parse(&header([1, 2, 3, 4], Endian::Little)).unwrap_err();
        assert!(matches!(err, CaptureError::MalformedCapture { .. }));
    }

    #[test]
    fn test_short_header_is_malformed() {
        let err = PcapHeader::parse(&[0xD4, 0xC3, 0xB2, 0xA1]).unwrap_err();
        assert!(matches!(err, CaptureError::MalformedCapture { .. }));
    }

    #[test]
    fn test_records_and_truncation() {
        let mut data = header([0xD4, 0xC3, 0xB2, 0xA1], Endian::Little);
        // complete record: ts 1.5s, 4 bytes
        for v in [1u32, 500_000, 4, 4] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[9, 9, 9, 9]);
        // truncated record: declares 100 bytes, holds 3
        for v in [2u32, 0, 100, 100] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[1, 2, 3]);

        let bytes = Bytes::from(data);
        let header = PcapHeader::parse(&bytes).unwrap();
        let mut records = PcapRecords::new(header, bytes);

        let first = records.next().unwrap().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.timestamp, Duration::from_millis(1500));
        assert_eq!(&first.data[..], &[9, 9, 9, 9]);

        let second = records.next().unwrap().unwrap_err();
        assert_eq!(
            second,
            CaptureError::TruncatedFrame {
                index: 2,
                declared: 100,
                available: 3
            }
        );
        assert!(records.next().is_none());
    }
}
