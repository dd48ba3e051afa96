//! Link, network and transport header decoding
//!
//! Walks a captured frame down to its UDP payload. Anything that is not
//! UDP over IPv4/IPv6 yields `Ok(None)`; frames whose length fields point
//! past the captured bytes yield an error describing the inconsistency.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::frame::{LinkType, UdpDatagram};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88A8;
const ETHERTYPE_QINQ_OLD: u16 = 0x9100;

const IPPROTO_UDP: u8 = 17;
const IPV6_HOP_BY_HOP: u8 = 0;
const IPV6_ROUTING: u8 = 43;
const IPV6_FRAGMENT: u8 = 44;
const IPV6_DEST_OPTS: u8 = 60;

const ETHERNET_HEADER_LEN: usize = 14;
const SLL_HEADER_LEN: usize = 16;
const SLL2_HEADER_LEN: usize = 20;
const NULL_HEADER_LEN: usize = 4;
const IPV4_MIN_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
const UDP_HEADER_LEN: usize = 8;

/// Result of decoding one frame
pub type DecodeResult = Result<Option<UdpDatagram>, String>;

fn be16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

/// Decode a frame captured on `link_type` down to its UDP datagram
pub fn decode_udp(link_type: LinkType, data: &[u8]) -> DecodeResult {
    match link_type {
        LinkType::Ethernet => decode_ethernet(data),
        LinkType::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                return Err(format!("short SLL header ({} bytes)", data.len()));
            }
            decode_ethertype(be16(data, 14), data, SLL_HEADER_LEN)
        }
        LinkType::LinuxSll2 => {
            if data.len() < SLL2_HEADER_LEN {
                return Err(format!("short SLL2 header ({} bytes)", data.len()));
            }
            decode_ethertype(be16(data, 0), data, SLL2_HEADER_LEN)
        }
        LinkType::Null | LinkType::Loop => decode_loopback(data),
        LinkType::Raw => match data.first().map(|b| b >> 4) {
            Some(4) => decode_ipv4(data, 0),
            Some(6) => decode_ipv6(data, 0),
            Some(_) => Ok(None),
            None => Err("empty raw IP frame".to_string()),
        },
        LinkType::Ipv4 => decode_ipv4(data, 0),
        LinkType::Ipv6 => decode_ipv6(data, 0),
        LinkType::Other(_) => Ok(None),
    }
}

fn decode_ethernet(data: &[u8]) -> DecodeResult {
    if data.len() < ETHERNET_HEADER_LEN {
        return Err(format!("short Ethernet header ({} bytes)", data.len()));
    }

    let mut offset = 12;
    let mut ethertype = be16(data, offset);
    offset += 2;

    // 802.1Q / 802.1ad tags, possibly stacked
    while matches!(ethertype, ETHERTYPE_VLAN | ETHERTYPE_QINQ | ETHERTYPE_QINQ_OLD) {
        if data.len() < offset + 4 {
            return Err("short VLAN tag".to_string());
        }
        ethertype = be16(data, offset + 2);
        offset += 4;
    }

    decode_ethertype(ethertype, data, offset)
}

fn decode_ethertype(ethertype: u16, data: &[u8], offset: usize) -> DecodeResult {
    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(data, offset),
        ETHERTYPE_IPV6 => decode_ipv6(data, offset),
        _ => Ok(None),
    }
}

fn decode_loopback(data: &[u8]) -> DecodeResult {
    if data.len() < NULL_HEADER_LEN {
        return Err(format!("short loopback header ({} bytes)", data.len()));
    }

    // The family is in the byte order of the capturing host, so accept both
    let raw = [data[0], data[1], data[2], data[3]];
    let families = [u32::from_le_bytes(raw), u32::from_be_bytes(raw)];

    if families.contains(&2) {
        decode_ipv4(data, NULL_HEADER_LEN)
    } else if families.iter().any(|f| matches!(f, 24 | 28 | 30)) {
        decode_ipv6(data, NULL_HEADER_LEN)
    } else {
        Ok(None)
    }
}

fn decode_ipv4(data: &[u8], offset: usize) -> DecodeResult {
    let packet = &data[offset..];
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return Err(format!("short IPv4 header ({} bytes)", packet.len()));
    }
    if packet[0] >> 4 != 4 {
        return Err(format!("IPv4 version nibble is {}", packet[0] >> 4));
    }

    let header_len = usize::from(packet[0] & 0x0F) * 4;
    if header_len < IPV4_MIN_HEADER_LEN || header_len > packet.len() {
        return Err(format!("bad IPv4 header length {}", header_len));
    }

    let total_len = usize::from(be16(packet, 2));
    if total_len < header_len {
        return Err(format!("IPv4 total length {} below header length", total_len));
    }
    if total_len > packet.len() {
        return Err(format!(
            "IPv4 total length {} exceeds {} captured bytes",
            total_len,
            packet.len()
        ));
    }

    // Fragments are not reassembled
    let flags_fragment = be16(packet, 6);
    let more_fragments = flags_fragment & 0x2000 != 0;
    let fragment_offset = flags_fragment & 0x1FFF;
    if more_fragments || fragment_offset != 0 {
        return Ok(None);
    }

    if packet[9] != IPPROTO_UDP {
        return Ok(None);
    }

    let source = IpAddr::V4(Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]));
    let destination = IpAddr::V4(Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]));

    decode_udp_header(
        data,
        offset + header_len,
        offset + total_len,
        source,
        destination,
    )
}

fn decode_ipv6(data: &[u8], offset: usize) -> DecodeResult {
    let packet = &data[offset..];
    if packet.len() < IPV6_HEADER_LEN {
        return Err(format!("short IPv6 header ({} bytes)", packet.len()));
    }
    if packet[0] >> 4 != 6 {
        return Err(format!("IPv6 version nibble is {}", packet[0] >> 4));
    }

    let payload_len = usize::from(be16(packet, 4));
    let end = if payload_len == 0 {
        // Jumbogram or unknown; bound by what was captured
        data.len()
    } else {
        let end = offset + IPV6_HEADER_LEN + payload_len;
        if end > data.len() {
            return Err(format!(
                "IPv6 payload length {} exceeds captured bytes",
                payload_len
            ));
        }
        end
    };

    let mut source = [0u8; 16];
    source.copy_from_slice(&packet[8..24]);
    let mut destination = [0u8; 16];
    destination.copy_from_slice(&packet[24..40]);

    let mut next_header = packet[6];
    let mut cursor = offset + IPV6_HEADER_LEN;
    loop {
        match next_header {
            IPPROTO_UDP => break,
            IPV6_HOP_BY_HOP | IPV6_ROUTING | IPV6_DEST_OPTS => {
                if cursor + 2 > end {
                    return Err("short IPv6 extension header".to_string());
                }
                let ext_len = (usize::from(data[cursor + 1]) + 1) * 8;
                next_header = data[cursor];
                cursor += ext_len;
                if cursor > end {
                    return Err("IPv6 extension header overruns packet".to_string());
                }
            }
            IPV6_FRAGMENT => return Ok(None),
            _ => return Ok(None),
        }
    }

    decode_udp_header(
        data,
        cursor,
        end,
        IpAddr::V6(Ipv6Addr::from(source)),
        IpAddr::V6(Ipv6Addr::from(destination)),
    )
}

fn decode_udp_header(
    data: &[u8],
    offset: usize,
    end: usize,
    source: IpAddr,
    destination: IpAddr,
) -> DecodeResult {
    if offset + UDP_HEADER_LEN > end {
        return Err(format!("short UDP header ({} bytes)", end.saturating_sub(offset)));
    }

    let source_port = be16(data, offset);
    let destination_port = be16(data, offset + 2);
    let udp_len = usize::from(be16(data, offset + 4));

    let available = end - offset;
    let datagram_len = if udp_len == 0 {
        available
    } else if udp_len < UDP_HEADER_LEN {
        return Err(format!("UDP length {} below header size", udp_len));
    } else if udp_len > available {
        return Err(format!(
            "UDP length {} exceeds {} available bytes",
            udp_len, available
        ));
    } else {
        udp_len
    };

    Ok(Some(UdpDatagram {
        source,
        destination,
        source_port,
        destination_port,
        payload_offset: offset + UDP_HEADER_LEN,
        payload_len: datagram_len - UDP_HEADER_LEN,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_udp(payload: &[u8], protocol: u8, flags_fragment: u16) -> Vec<u8> {
        let total = 20 + 8 + payload.len();
        let mut packet = vec![
            0x45, 0, (total >> 8) as u8, total as u8, 0, 0,
            (flags_fragment >> 8) as u8, flags_fragment as u8,
            64, protocol, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ];
        let udp_len = 8 + payload.len();
        packet.extend_from_slice(&[0x0F, 0xA0, 0x13, 0x88, (udp_len >> 8) as u8, udp_len as u8, 0, 0]);
        packet.extend_from_slice(payload);
        packet
    }

    fn ethernet(ethertype: u16, body: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn test_ethernet_ipv4_udp() {
        let frame = ethernet(ETHERTYPE_IPV4, &ipv4_udp(b"hello", IPPROTO_UDP, 0));
        let datagram = decode_udp(LinkType::Ethernet, &frame).unwrap().unwrap();
        assert_eq!(datagram.source_port, 4000);
        assert_eq!(datagram.destination_port, 5000);
        assert_eq!(datagram.payload_offset, 14 + 28);
        assert_eq!(datagram.payload_len, 5);
        assert_eq!(datagram.source.to_string(), "10.0.0.1");
    }

    #[test]
    fn test_ethernet_trailer_is_ignored() {
        let mut frame = ethernet(ETHERTYPE_IPV4, &ipv4_udp(b"hi", IPPROTO_UDP, 0));
        frame.extend_from_slice(&[0u8; 16]);
        let datagram = decode_udp(LinkType::Ethernet, &frame).unwrap().unwrap();
        assert_eq!(datagram.payload_len, 2);
    }

    #[test]
    fn test_vlan_tagged() {
        let mut body = vec![0x00, 0x05];
        body.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        body.extend_from_slice(&ipv4_udp(b"abc", IPPROTO_UDP, 0));
        let frame = ethernet(ETHERTYPE_VLAN, &body);
        let datagram = decode_udp(LinkType::Ethernet, &frame).unwrap().unwrap();
        assert_eq!(datagram.payload_len, 3);
        assert_eq!(datagram.payload_offset, 18 + 28);
    }

    #[test]
    fn test_tcp_is_not_udp() {
        let frame = ethernet(ETHERTYPE_IPV4, &ipv4_udp(b"abc", 6, 0));
        assert_eq!(decode_udp(LinkType::Ethernet, &frame), Ok(None));
    }

    #[test]
    fn test_arp_is_not_udp() {
        let frame = ethernet(0x0806, &[0u8; 28]);
        assert_eq!(decode_udp(LinkType::Ethernet, &frame), Ok(None));
    }

    #[test]
    fn test_fragments_are_skipped() {
        let frame = ethernet(ETHERTYPE_IPV4, &ipv4_udp(b"abc", IPPROTO_UDP, 0x2000));
        assert_eq!(decode_udp(LinkType::Ethernet, &frame), Ok(None));
    }

    #[test]
    fn test_snapped_ipv4_is_malformed() {
        let mut frame = ethernet(ETHERTYPE_IPV4, &ipv4_udp(&[0u8; 100], IPPROTO_UDP, 0));
        frame.truncate(60);
        assert!(decode_udp(LinkType::Ethernet, &frame).is_err());
    }

    #[test]
    fn test_raw_ipv4() {
        let packet = ipv4_udp(b"xyz", IPPROTO_UDP, 0);
        let datagram = decode_udp(LinkType::Raw, &packet).unwrap().unwrap();
        assert_eq!(datagram.payload_offset, 28);
    }

    #[test]
    fn test_loopback_both_byte_orders() {
        let packet = ipv4_udp(b"xyz", IPPROTO_UDP, 0);
        let mut le = 2u32.to_le_bytes().to_vec();
        le.extend_from_slice(&packet);
        let mut be = 2u32.to_be_bytes().to_vec();
        be.extend_from_slice(&packet);
        assert!(decode_udp(LinkType::Null, &le).unwrap().is_some());
        assert!(decode_udp(LinkType::Loop, &be).unwrap().is_some());
    }

    #[test]
    fn test_ipv6_with_hop_by_hop() {
        let payload = b"rtp!";
        let udp_len = 8 + payload.len();
        let mut packet = vec![0x60, 0, 0, 0];
        packet.extend_from_slice(&((8 + udp_len) as u16).to_be_bytes());
        packet.push(IPV6_HOP_BY_HOP);
        packet.push(64);
        packet.extend_from_slice(&[0u8; 15]);
        packet.push(1);
        packet.extend_from_slice(&[0u8; 15]);
        packet.push(2);
        // hop-by-hop: next header UDP, length 0 (8 bytes)
        packet.extend_from_slice(&[IPPROTO_UDP, 0, 0, 0, 0, 0, 0, 0]);
        packet.extend_from_slice(&[0x1F, 0x40, 0x1F, 0x41, 0, udp_len as u8, 0, 0]);
        packet.extend_from_slice(payload);

        let frame = ethernet(ETHERTYPE_IPV6, &packet);
        let datagram = decode_udp(LinkType::Ethernet, &frame).unwrap().unwrap();
        assert_eq!(datagram.source.to_string(), "::1");
        assert_eq!(datagram.destination.to_string(), "::2");
        assert_eq!(datagram.source_port, 8000);
        assert_eq!(datagram.payload_len, 4);
        assert_eq!(datagram.payload_offset, 14 + 40 + 8 + 8);
    }

    #[test]
    fn test_unknown_link_type() {
        assert_eq!(decode_udp(LinkType::Other(147), &[0u8; 64]), Ok(None));
    }
}
