//! Captured frame types

use bytes::Bytes;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Link-layer header type of a capture interface (tcpdump.org LINKTYPE_* values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// BSD loopback, family in host byte order (0)
    Null,
    /// IEEE 802.3 Ethernet (1)
    Ethernet,
    /// Raw IP, version taken from the first nibble (12, 14, 101)
    Raw,
    /// OpenBSD loopback, family in network byte order (108)
    Loop,
    /// Linux cooked capture v1 (113)
    LinuxSll,
    /// Raw IPv4 (228)
    Ipv4,
    /// Raw IPv6 (229)
    Ipv6,
    /// Linux cooked capture v2 (276)
    LinuxSll2,
    /// Anything else; frames on such interfaces are never decoded
    Other(u32),
}

impl LinkType {
    /// Map a LINKTYPE/DLT code to a link type
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Null,
            1 => Self::Ethernet,
            12 | 14 | 101 => Self::Raw,
            108 => Self::Loop,
            113 => Self::LinuxSll,
            228 => Self::Ipv4,
            229 => Self::Ipv6,
            276 => Self::LinuxSll2,
            other => Self::Other(other),
        }
    }

    /// The canonical LINKTYPE code
    pub fn code(self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Ethernet => 1,
            Self::Raw => 101,
            Self::Loop => 108,
            Self::LinuxSll => 113,
            Self::Ipv4 => 228,
            Self::Ipv6 => 229,
            Self::LinuxSll2 => 276,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "LINKTYPE_{}", code),
            known => write!(f, "{:?}", known),
        }
    }
}

/// A raw record as stored in the capture container, before any header decoding
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Frame number (1-based, capture order)
    pub index: u64,
    /// Arrival time on the capture clock
    pub timestamp: Duration,
    /// Link type of the interface the record was captured on
    pub link_type: LinkType,
    /// Length of the frame on the wire (may exceed `data.len()` when snapped)
    pub original_len: usize,
    /// Captured bytes
    pub data: Bytes,
}

/// A UDP-carrying frame with its header summary
///
/// Frames are immutable once parsed; the payload is a zero-copy view
/// into the capture buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    /// Frame number (1-based, capture order)
    pub index: u64,
    /// Arrival time on the capture clock
    pub timestamp: Duration,
    /// Link-layer type the frame was decoded from
    pub link_type: LinkType,
    /// Source IP address
    pub source: IpAddr,
    /// Destination IP address
    pub destination: IpAddr,
    /// UDP source port
    pub source_port: u16,
    /// UDP destination port
    pub destination_port: u16,
    /// Offset of the UDP payload within `data`
    pub payload_offset: usize,
    /// Length of the UDP payload
    pub payload_len: usize,
    data: Bytes,
}

impl CaptureFrame {
    pub(crate) fn new(record: &RawRecord, datagram: UdpDatagram) -> Self {
        Self {
            index: record.index,
            timestamp: record.timestamp,
            link_type: record.link_type,
            source: datagram.source,
            destination: datagram.destination,
            source_port: datagram.source_port,
            destination_port: datagram.destination_port,
            payload_offset: datagram.payload_offset,
            payload_len: datagram.payload_len,
            data: record.data.clone(),
        }
    }

    /// All captured bytes of the frame, link header included
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The UDP payload
    pub fn payload(&self) -> Bytes {
        self.data
            .slice(self.payload_offset..self.payload_offset + self.payload_len)
    }

    /// Source endpoint
    pub fn source_addr(&self) -> SocketAddr {
        SocketAddr::new(self.source, self.source_port)
    }

    /// Destination endpoint
    pub fn destination_addr(&self) -> SocketAddr {
        SocketAddr::new(self.destination, self.destination_port)
    }
}

/// Header summary of a decoded UDP datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
    pub payload_offset: usize,
    pub payload_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_link_type_codes() {
        assert_eq!(LinkType::from_code(1), LinkType::Ethernet);
        assert_eq!(LinkType::from_code(12), LinkType::Raw);
        assert_eq!(LinkType::from_code(276), LinkType::LinuxSll2);
        assert_eq!(LinkType::from_code(147), LinkType::Other(147));
        assert_eq!(LinkType::Ethernet.code(), 1);
        assert_eq!(LinkType::Other(147).to_string(), "LINKTYPE_147");
    }

    #[test]
    fn test_payload_is_a_view() {
        let record = RawRecord {
            index: 1,
            timestamp: Duration::from_millis(5),
            link_type: LinkType::Raw,
            original_len: 6,
            data: Bytes::from_static(&[0, 1, 2, 3, 4, 5]),
        };
        let frame = CaptureFrame::new(
            &record,
            UdpDatagram {
                source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                source_port: 4000,
                destination_port: 5000,
                payload_offset: 2,
                payload_len: 3,
            },
        );
        assert_eq!(&frame.payload()[..], &[2, 3, 4]);
        assert_eq!(frame.source_addr().port(), 4000);
        assert_eq!(frame.destination_addr().to_string(), "10.0.0.2:5000");
    }
}
