//! L16: uncompressed 16-bit linear PCM in network byte order

use crate::error::Result;
use crate::types::{AudioDecoder, CodecInfo};

/// L16 decoder, mono or interleaved multi-channel
#[derive(Debug, Clone)]
pub struct L16Decoder {
    info: CodecInfo,
}

impl L16Decoder {
    pub fn new(info: CodecInfo) -> Self {
        Self { info }
    }
}

impl AudioDecoder for L16Decoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        // Only whole sample frames (one sample per channel) are kept
        let frame_bytes = 2 * usize::from(self.info.channels.max(1));
        let usable = payload.len() - payload.len() % frame_bytes;
        Ok(payload[..usable]
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(channels: u8) -> CodecInfo {
        CodecInfo {
            name: "L16",
            sample_rate: 44100,
            channels,
            payload_type: None,
        }
    }

    #[test]
    fn test_big_endian_samples() {
        let mut decoder = L16Decoder::new(info(1));
        let out = decoder.decode(&[0x00, 0x01, 0xFF, 0xFF, 0x80, 0x00]).unwrap();
        assert_eq!(out, vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_partial_stereo_frame_is_dropped() {
        let mut decoder = L16Decoder::new(info(2));
        let out = decoder.decode(&[0, 1, 0, 2, 0, 3]).unwrap();
        assert_eq!(out, vec![1, 2]);
    }
}
