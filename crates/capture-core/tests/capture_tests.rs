//! Integration tests for capture reading

use proptest::prelude::*;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use voipspy_capture_core::{
    CaptureError, CaptureFormat, CaptureReader, FrameStats, LinkType, PcapWriter,
};

fn endpoints() -> (SocketAddrV4, SocketAddrV4) {
    (
        SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 1), 16384),
        SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 16386),
    )
}

fn drain(reader: &CaptureReader) -> (Vec<Result<Vec<u8>, CaptureError>>, FrameStats) {
    let mut frames = reader.frames();
    let mut out = Vec::new();
    for item in frames.by_ref() {
        out.push(item.map(|frame| frame.payload().to_vec()));
    }
    (out, frames.stats())
}

#[test]
fn test_udp_frames_are_forwarded_in_order() {
    let (src, dst) = endpoints();
    let mut writer = PcapWriter::new();
    for i in 0..5u8 {
        writer.write_udp(Duration::from_millis(20 * u64::from(i)), src, dst, &[i; 12]);
    }

    let reader = CaptureReader::new(writer.into_bytes()).unwrap();
    assert_eq!(reader.format(), CaptureFormat::Pcap);

    let frames: Vec<_> = reader.frames().map(Result::unwrap).collect();
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, i as u64 + 1);
        assert_eq!(frame.source_addr().to_string(), "10.1.1.1:16384");
        assert_eq!(frame.destination_port, 16386);
        assert_eq!(frame.payload().len(), 12);
        assert_eq!(frame.payload()[0], i as u8);
        assert_eq!(frame.timestamp, Duration::from_millis(20 * i as u64));
    }
}

#[test]
fn test_non_udp_frames_are_counted_not_forwarded() {
    let (src, dst) = endpoints();
    let mut writer = PcapWriter::new();
    writer.write_udp(Duration::ZERO, src, dst, b"first");

    // ARP frame
    let mut arp = vec![0xFF; 12];
    arp.extend_from_slice(&[0x08, 0x06]);
    arp.extend_from_slice(&[0u8; 28]);
    writer.write_raw(Duration::from_millis(1), &arp);

    writer.write_udp(Duration::from_millis(2), src, dst, b"second");

    let reader = CaptureReader::new(writer.into_bytes()).unwrap();
    let (items, stats) = drain(&reader);
    assert_eq!(items.len(), 2);
    assert_eq!(
        stats,
        FrameStats {
            total: 3,
            udp: 2,
            non_udp: 1,
            dropped: 0
        }
    );
}

#[test]
fn test_truncated_last_frame_is_dropped() {
    let (src, dst) = endpoints();
    let mut writer = PcapWriter::new();
    writer.write_udp(Duration::ZERO, src, dst, &[1; 20]);
    writer.write_udp(Duration::from_millis(20), src, dst, &[2; 20]);
    let mut bytes = writer.into_bytes();

    // Third record declares 200 bytes but only 10 follow
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&40_000u32.to_le_bytes());
    bytes.extend_from_slice(&200u32.to_le_bytes());
    bytes.extend_from_slice(&200u32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 10]);

    let reader = CaptureReader::new(bytes).unwrap();
    let (items, stats) = drain(&reader);
    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert!(matches!(err, CaptureError::TruncatedFrame { index: 3, .. }));
    assert!(err.is_recoverable());
    assert_eq!(stats.total, 3);
    assert_eq!(stats.dropped, 1);
}

#[test]
fn test_snapped_frame_is_dropped() {
    let (src, dst) = endpoints();
    let full = voipspy_capture_core::writer::ipv4_udp_packet(src, dst, &[0u8; 160]);

    let mut writer = PcapWriter::with_link_type(LinkType::Raw);
    writer.write_record(Duration::ZERO, &full[..60], full.len());
    writer.write_raw(Duration::from_millis(20), &full);

    let reader = CaptureReader::new(writer.into_bytes()).unwrap();
    let (items, stats) = drain(&reader);
    assert!(matches!(
        items[0],
        Err(CaptureError::TruncatedFrame { index: 1, .. })
    ));
    assert_eq!(items[1].as_ref().unwrap().len(), 160);
    assert_eq!(stats.udp + stats.non_udp + stats.dropped, stats.total);
}

#[test]
fn test_bad_global_header_is_fatal() {
    let err = CaptureReader::new(vec![0u8; 24]).err().unwrap();
    assert!(matches!(err, CaptureError::MalformedCapture { .. }));
    assert!(!err.is_recoverable());

    let err = CaptureReader::new(Vec::new()).err().unwrap();
    assert!(matches!(err, CaptureError::MalformedCapture { .. }));
}

#[test]
fn test_frames_restart_from_the_beginning() {
    let (src, dst) = endpoints();
    let mut writer = PcapWriter::new();
    writer.write_udp(Duration::ZERO, src, dst, b"a");
    writer.write_udp(Duration::ZERO, src, dst, b"b");
    let reader = CaptureReader::new(writer.into_bytes()).unwrap();

    assert_eq!(reader.frames().count(), 2);
    assert_eq!(reader.frames().count(), 2);
    assert_eq!(reader.into_iter().count(), 2);
}

#[test]
fn test_big_endian_pcapng_capture() {
    let (src, dst) = endpoints();
    let packet = voipspy_capture_core::writer::ipv4_udp_packet(src, dst, b"rtp!");

    fn block(kind: u32, body: &[u8]) -> Vec<u8> {
        let mut padded = body.to_vec();
        while padded.len() % 4 != 0 {
            padded.push(0);
        }
        let total = (padded.len() + 12) as u32;
        let mut out = kind.to_be_bytes().to_vec();
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(&padded);
        out.extend_from_slice(&total.to_be_bytes());
        out
    }

    let mut shb = 0x1A2B_3C4Du32.to_be_bytes().to_vec();
    shb.extend_from_slice(&1u16.to_be_bytes());
    shb.extend_from_slice(&0u16.to_be_bytes());
    shb.extend_from_slice(&(-1i64).to_be_bytes());

    let mut idb = 228u16.to_be_bytes().to_vec();
    idb.extend_from_slice(&[0, 0]);
    idb.extend_from_slice(&0u32.to_be_bytes());

    let mut epb = 0u32.to_be_bytes().to_vec();
    epb.extend_from_slice(&0u32.to_be_bytes());
    epb.extend_from_slice(&7_000_000u32.to_be_bytes());
    epb.extend_from_slice(&(packet.len() as u32).to_be_bytes());
    epb.extend_from_slice(&(packet.len() as u32).to_be_bytes());
    epb.extend_from_slice(&packet);

    let mut data = block(0x0A0D_0D0A, &shb);
    data.extend(block(1, &idb));
    data.extend(block(6, &epb));

    let reader = CaptureReader::new(data).unwrap();
    assert_eq!(reader.format(), CaptureFormat::Pcapng);
    let frames: Vec<_> = reader.frames().map(Result::unwrap).collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].link_type, LinkType::Ipv4);
    assert_eq!(frames[0].timestamp, Duration::from_secs(7));
    assert_eq!(&frames[0].payload()[..], b"rtp!");
}

proptest! {
    #[test]
    fn prop_arbitrary_records_keep_accounting(
        records in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..96), 0..24)
    ) {
        let mut writer = PcapWriter::new();
        for (i, record) in records.iter().enumerate() {
            writer.write_raw(Duration::from_millis(i as u64), record);
        }
        let reader = CaptureReader::new(writer.into_bytes()).unwrap();
        let mut frames = reader.frames();
        let forwarded = frames.by_ref().filter(|item| item.is_ok()).count() as u64;
        let stats = frames.stats();

        prop_assert_eq!(stats.total, records.len() as u64);
        prop_assert_eq!(stats.udp, forwarded);
        prop_assert_eq!(stats.udp + stats.non_udp + stats.dropped, stats.total);
    }
}
