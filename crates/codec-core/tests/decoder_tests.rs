//! Decoder behaviour across the payload type registry

use proptest::prelude::*;
use voipspy_codec_core::codecs::g711::{alaw_compress, ulaw_compress};
use voipspy_codec_core::{CodecError, CodecType, PayloadTypeRegistry};

/// Per-channel samples a decoder produces for a payload of `len` bytes
fn expected_samples(codec: CodecType, channels: usize, len: usize) -> usize {
    match codec {
        CodecType::G711Pcmu | CodecType::G711Pcma => len,
        CodecType::G722 => len * 2,
        CodecType::L16 => len / (2 * channels),
        CodecType::Dvi4 => (len - 4) * 2,
        _ => 0,
    }
}

#[test]
fn test_every_decodable_static_type_decodes_a_frame() {
    let registry = PayloadTypeRegistry::new();
    for format in registry.iter().filter(|f| f.codec.carries_audio()) {
        let mut decoder = match registry.create_decoder(format.payload_type) {
            Ok(decoder) => decoder,
            Err(err) => {
                assert!(!format.codec.is_decodable(), "{} should decode", format);
                assert!(matches!(err, CodecError::UnsupportedCodec { .. }));
                continue;
            }
        };
        let payload = vec![0x55u8; 164];
        let samples = decoder.decode(&payload).unwrap();
        let channels = usize::from(format.channels);
        assert_eq!(
            samples.len() / channels,
            expected_samples(format.codec, channels, payload.len()),
            "{}",
            format
        );
    }
}

#[test]
fn test_g711_tone_survives_decoding() {
    let tone: Vec<i16> = (0..160)
        .map(|n| (8000.0 * (2.0 * std::f64::consts::PI * 440.0 * f64::from(n) / 8000.0).sin()) as i16)
        .collect();
    let registry = PayloadTypeRegistry::new();
    for (pt, compress) in [(0u8, ulaw_compress as fn(i16) -> u8), (8, alaw_compress)] {
        let encoded: Vec<u8> = tone.iter().map(|&s| compress(s)).collect();
        let decoded = registry.create_decoder(pt).unwrap().decode(&encoded).unwrap();
        for (orig, dec) in tone.iter().zip(&decoded) {
            assert!((i32::from(*orig) - i32::from(*dec)).abs() <= 256);
        }
    }
}

#[test]
fn test_non_audio_types_produce_no_samples() {
    let registry = PayloadTypeRegistry::new();
    let mut cn = registry.create_decoder(13).unwrap();
    assert!(cn.decode(&[40]).unwrap().is_empty());
    assert!(cn.decode(&[]).is_err());
}

proptest! {
    #[test]
    fn prop_decoders_accept_arbitrary_payloads(pt in prop::sample::select(vec![0u8, 8, 9, 10, 11]), payload in prop::collection::vec(any::<u8>(), 0..400)) {
        let registry = PayloadTypeRegistry::new();
        let format = registry.format(pt).unwrap();
        let mut decoder = registry.create_decoder(pt).unwrap();
        let samples = decoder.decode(&payload).unwrap();
        let channels = usize::from(format.channels);
        prop_assert_eq!(samples.len() % channels, 0);
        prop_assert_eq!(samples.len() / channels, expected_samples(format.codec, channels, payload.len()));
    }

    #[test]
    fn prop_dvi4_never_panics(payload in prop::collection::vec(any::<u8>(), 0..200)) {
        let registry = PayloadTypeRegistry::new();
        let mut decoder = registry.create_decoder(5).unwrap();
        if let Ok(samples) = decoder.decode(&payload) {
            prop_assert_eq!(samples.len(), (payload.len() - 4) * 2);
        }
    }
}
