//! Comfort noise (RFC 3389)
//!
//! A CN packet signals silence until the next audio packet. It contributes
//! no samples of its own; the stream decoder fills the time span up to the
//! next audio packet's timestamp with silence.

use crate::error::{CodecError, Result};
use crate::types::{AudioDecoder, CodecInfo};

/// Comfort noise "decoder"
#[derive(Debug, Clone)]
pub struct ComfortNoiseDecoder {
    info: CodecInfo,
    last_level: Option<u8>,
}

impl ComfortNoiseDecoder {
    pub fn new(info: CodecInfo) -> Self {
        Self {
            info,
            last_level: None,
        }
    }

    /// Noise level of the last CN packet, in -dBov
    pub fn last_level(&self) -> Option<u8> {
        self.last_level
    }
}

impl AudioDecoder for ComfortNoiseDecoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        let level = payload
            .first()
            .ok_or_else(|| CodecError::invalid_payload("empty comfort noise payload"))?;
        self.last_level = Some(level & 0x7F);
        Ok(Vec::new())
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {
        self.last_level = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_samples() {
        let mut decoder = ComfortNoiseDecoder::new(CodecInfo {
            name: "CN",
            sample_rate: 8000,
            channels: 1,
            payload_type: Some(13),
        });
        assert!(decoder.decode(&[40, 1, 2]).unwrap().is_empty());
        assert_eq!(decoder.last_level(), Some(40));
        assert!(decoder.decode(&[]).is_err());
    }
}
