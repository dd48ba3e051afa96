//! Stream demultiplexing
//!
//! Packets are partitioned by the full 5-tuple plus SSRC. Two SSRCs on the
//! same address/port pair are two streams; the same SSRC on two port pairs
//! is two streams as well.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;
use voipspy_capture_core::CaptureFrame;
use voipspy_rtp_core::{RtpPacket, RtpSsrc};

/// Identity of one RTP stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamKey {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub source_port: u16,
    pub destination_port: u16,
    pub ssrc: RtpSsrc,
}

impl StreamKey {
    pub fn new(frame: &CaptureFrame, ssrc: RtpSsrc) -> Self {
        Self {
            source: frame.source,
            destination: frame.destination,
            source_port: frame.source_port,
            destination_port: frame.destination_port,
            ssrc,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ssrc=0x{:08X}",
            std::net::SocketAddr::new(self.source, self.source_port),
            std::net::SocketAddr::new(self.destination, self.destination_port),
            self.ssrc
        )
    }
}

/// All packets of one stream, in capture order
#[derive(Debug, Clone)]
pub struct StreamPackets {
    pub key: StreamKey,
    pub packets: Vec<RtpPacket>,
}

/// Incremental partitioner
#[derive(Debug, Default)]
pub struct StreamDemultiplexer {
    index: HashMap<StreamKey, usize>,
    streams: Vec<StreamPackets>,
}

impl StreamDemultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a packet; returns true if it opened a new stream
    pub fn push(&mut self, key: StreamKey, packet: RtpPacket) -> bool {
        match self.index.get(&key) {
            Some(&slot) => {
                self.streams[slot].packets.push(packet);
                false
            }
            None => {
                debug!("New stream {} (pt {})", key, packet.payload_type);
                self.index.insert(key, self.streams.len());
                self.streams.push(StreamPackets {
                    key,
                    packets: vec![packet],
                });
                true
            }
        }
    }

    /// Number of streams discovered so far
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Packets collected for a stream
    pub fn packets(&self, key: &StreamKey) -> Option<&[RtpPacket]> {
        self.index
            .get(key)
            .map(|&slot| self.streams[slot].packets.as_slice())
    }

    /// Stream keys in order of first appearance
    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.streams.iter().map(|stream| &stream.key)
    }

    /// Close every stream (end of capture)
    pub fn finish(self) -> Vec<StreamPackets> {
        self.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::Ipv4Addr;

    fn key(ssrc: u32, source_port: u16) -> StreamKey {
        StreamKey {
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            source_port,
            destination_port: 4000,
            ssrc,
        }
    }

    fn packet(ssrc: u32, seq: u16) -> RtpPacket {
        RtpPacket::new(0, seq, u32::from(seq) * 160, ssrc, Bytes::from_static(&[0xFF; 4]))
    }

    #[test]
    fn test_interleaved_ssrcs_split() {
        let mut demux = StreamDemultiplexer::new();
        for seq in 0..10u16 {
            assert_eq!(demux.push(key(1, 5000), packet(1, seq)), seq == 0);
            assert_eq!(demux.push(key(2, 5000), packet(2, seq)), seq == 0);
        }
        assert_eq!(demux.len(), 2);
        let streams = demux.finish();
        assert_eq!(streams[0].key.ssrc, 1);
        assert!(streams[0].packets.iter().all(|p| p.ssrc == 1));
        assert!(streams[1].packets.iter().all(|p| p.ssrc == 2));
    }

    #[test]
    fn test_same_ssrc_different_ports() {
        let mut demux = StreamDemultiplexer::new();
        demux.push(key(7, 5000), packet(7, 0));
        demux.push(key(7, 5002), packet(7, 0));
        let keys: Vec<_> = demux.keys().copied().collect();
        assert_eq!(keys, vec![key(7, 5000), key(7, 5002)]);
        assert_eq!(demux.packets(&key(7, 5002)).map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(key(0xAB, 5000).to_string(), "10.0.0.1:5000 -> 10.0.0.2:4000 ssrc=0x000000AB");
    }
}
