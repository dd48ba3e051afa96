//! Classic pcap writer
//!
//! Produces little-endian, microsecond-resolution captures. UDP datagrams
//! are framed as Ethernet II / IPv4 / UDP with a valid IPv4 header checksum
//! and a zero UDP checksum.

use std::net::SocketAddrV4;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::frame::LinkType;
use crate::pcap::PCAP_MAGIC_MICROS;

const SOURCE_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
const DESTINATION_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

/// Ones' complement checksum over an IPv4 header
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| {
            let hi = u32::from(pair[0]) << 8;
            let lo = pair.get(1).copied().map(u32::from).unwrap_or(0);
            hi | lo
        })
        .sum();
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Build an IPv4/UDP packet (no link header)
pub fn ipv4_udp_packet(source: SocketAddrV4, destination: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let total_len = 20 + udp_len;

    let mut packet = Vec::with_capacity(total_len);
    packet.extend_from_slice(&[0x45, 0x00]);
    packet.extend_from_slice(&(total_len as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 64, 17, 0x00, 0x00]);
    packet.extend_from_slice(&source.ip().octets());
    packet.extend_from_slice(&destination.ip().octets());
    let checksum = ipv4_checksum(&packet[..20]);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());

    packet.extend_from_slice(&source.port().to_be_bytes());
    packet.extend_from_slice(&destination.port().to_be_bytes());
    packet.extend_from_slice(&(udp_len as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x00]);
    packet.extend_from_slice(payload);
    packet
}

/// Writes a classic pcap capture into memory
#[derive(Debug, Clone)]
pub struct PcapWriter {
    buffer: Vec<u8>,
    link_type: LinkType,
    frames: u64,
}

impl PcapWriter {
    /// New Ethernet capture
    pub fn new() -> Self {
        Self::with_link_type(LinkType::Ethernet)
    }

    /// New capture whose records are on `link_type`
    pub fn with_link_type(link_type: LinkType) -> Self {
        let mut buffer = Vec::with_capacity(4096);
        buffer.extend_from_slice(&PCAP_MAGIC_MICROS.to_le_bytes());
        buffer.extend_from_slice(&2u16.to_le_bytes());
        buffer.extend_from_slice(&4u16.to_le_bytes());
        buffer.extend_from_slice(&0i32.to_le_bytes());
        buffer.extend_from_slice(&0u32.to_le_bytes());
        buffer.extend_from_slice(&65535u32.to_le_bytes());
        buffer.extend_from_slice(&link_type.code().to_le_bytes());
        Self {
            buffer,
            link_type,
            frames: 0,
        }
    }

    /// Link type written in the global header
    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    /// Number of records written
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Append a record holding `data` verbatim
    pub fn write_raw(&mut self, timestamp: Duration, data: &[u8]) -> &mut Self {
        self.write_record(timestamp, data, data.len())
    }

    /// Append a record whose wire length differs from the captured bytes
    pub fn write_record(&mut self, timestamp: Duration, data: &[u8], original_len: usize) -> &mut Self {
        self.buffer
            .extend_from_slice(&(timestamp.as_secs() as u32).to_le_bytes());
        self.buffer
            .extend_from_slice(&timestamp.subsec_micros().to_le_bytes());
        self.buffer.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(&(original_len as u32).to_le_bytes());
        self.buffer.extend_from_slice(data);
        self.frames += 1;
        self
    }

    /// Append an Ethernet/IPv4/UDP frame carrying `payload`
    pub fn write_udp(
        &mut self,
        timestamp: Duration,
        source: SocketAddrV4,
        destination: SocketAddrV4,
        payload: &[u8],
    ) -> &mut Self {
        let packet = ipv4_udp_packet(source, destination, payload);
        match self.link_type {
            LinkType::Ethernet => {
                let mut frame = Vec::with_capacity(14 + packet.len());
                frame.extend_from_slice(&DESTINATION_MAC);
                frame.extend_from_slice(&SOURCE_MAC);
                frame.extend_from_slice(&0x0800u16.to_be_bytes());
                frame.extend_from_slice(&packet);
                self.write_raw(timestamp, &frame)
            }
            _ => self.write_raw(timestamp, &packet),
        }
    }

    /// Captured bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Finish and take the capture bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write the capture to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.buffer)?;
        Ok(())
    }
}

impl Default for PcapWriter {
    fn default() -> Self {
        Self::new()
    }
}
