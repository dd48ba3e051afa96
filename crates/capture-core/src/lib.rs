//! # Capture-Core: packet capture parsing
//!
//! Reads classic pcap and pcapng captures and walks every frame down to its
//! UDP payload.
//!
//! ## Features
//!
//! - **Containers**: pcap (micro/nanosecond, either byte order) and pcapng
//!   (section, interface, enhanced and simple packet blocks)
//! - **Link layers**: Ethernet with VLAN tags, Linux cooked v1/v2, raw IP,
//!   BSD loopback
//! - **Network**: IPv4 and IPv6 with extension headers
//! - **Zero-copy**: frames and payloads are slices of the capture buffer
//!
//! ## Usage
//!
//! ```rust
//! use std::net::{Ipv4Addr, SocketAddrV4};
//! use std::time::Duration;
//! use voipspy_capture_core::{CaptureReader, PcapWriter};
//!
//! let mut writer = PcapWriter::new();
//! writer.write_udp(
//!     Duration::from_millis(20),
//!     SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 40000),
//!     SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 40002),
//!     b"hello",
//! );
//!
//! let reader = CaptureReader::new(writer.into_bytes())?;
//! let mut frames = reader.frames();
//! let frame = frames.next().unwrap()?;
//! assert_eq!(&frame.payload()[..], b"hello");
//! assert_eq!(frames.stats().udp, 1);
//! # Ok::<(), voipspy_capture_core::CaptureError>(())
//! ```

pub mod error;
pub mod frame;
pub mod link;
pub mod pcap;
pub mod pcapng;
pub mod reader;
pub mod writer;

pub use error::{CaptureError, Result};
pub use frame::{CaptureFrame, LinkType, RawRecord, UdpDatagram};
pub use reader::{CaptureFormat, CaptureReader, FrameStats, Frames};
pub use writer::PcapWriter;

/// Byte order of a capture section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Read a u16 from the first two bytes of `bytes`
    pub fn u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            Self::Little => u16::from_le_bytes(raw),
            Self::Big => u16::from_be_bytes(raw),
        }
    }

    /// Read a u32 from the first four bytes of `bytes`
    pub fn u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            Self::Little => u32::from_le_bytes(raw),
            Self::Big => u32::from_be_bytes(raw),
        }
    }
}
