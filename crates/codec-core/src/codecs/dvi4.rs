//! DVI4: IMA ADPCM as profiled by RFC 3551 section 4.5.1
//!
//! Every packet starts with a four-byte state header (predicted value as a
//! big-endian i16, step index, one reserved byte) followed by 4-bit codes,
//! first sample in the high nibble. Packets decode independently.

use crate::error::{CodecError, Result};
use crate::types::{AudioDecoder, CodecInfo};

const HEADER_LEN: usize = 4;

const INDEX_TABLE: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449,
    494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493,
    10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

/// Predictor state carried between nibbles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdpcmState {
    pub predicted: i32,
    pub index: i32,
}

impl AdpcmState {
    /// Decode one 4-bit code and advance the predictor
    pub fn decode_nibble(&mut self, code: u8) -> i16 {
        let step = STEP_TABLE[self.index as usize];
        let mut diff = step >> 3;
        if code & 4 != 0 {
            diff += step;
        }
        if code & 2 != 0 {
            diff += step >> 1;
        }
        if code & 1 != 0 {
            diff += step >> 2;
        }
        if code & 8 != 0 {
            self.predicted -= diff;
        } else {
            self.predicted += diff;
        }
        self.predicted = self.predicted.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
        self.index = (self.index + INDEX_TABLE[usize::from(code & 7)]).clamp(0, 88);
        self.predicted as i16
    }
}

/// DVI4 decoder
#[derive(Debug, Clone)]
pub struct Dvi4Decoder {
    info: CodecInfo,
}

impl Dvi4Decoder {
    pub fn new(info: CodecInfo) -> Self {
        Self { info }
    }
}

impl AudioDecoder for Dvi4Decoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        if payload.len() < HEADER_LEN {
            return Err(CodecError::invalid_payload(format!(
                "DVI4 payload of {} bytes has no state header",
                payload.len()
            )));
        }
        let index = payload[2];
        if index > 88 {
            return Err(CodecError::invalid_payload(format!(
                "DVI4 step index {} out of range",
                index
            )));
        }

        let mut state = AdpcmState {
            predicted: i32::from(i16::from_be_bytes([payload[0], payload[1]])),
            index: i32::from(index),
        };
        let body = &payload[HEADER_LEN..];
        let mut out = Vec::with_capacity(body.len() * 2);
        for &byte in body {
            out.push(state.decode_nibble(byte >> 4));
            out.push(state.decode_nibble(byte & 0x0F));
        }
        Ok(out)
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> Dvi4Decoder {
        Dvi4Decoder::new(CodecInfo {
            name: "DVI4",
            sample_rate: 8000,
            channels: 1,
            payload_type: Some(5),
        })
    }

    #[test]
    fn test_nibble_steps() {
        let mut state = AdpcmState::default();
        // step 7: (7 >> 3) + 7 + 3 + 1 = 11
        assert_eq!(state.decode_nibble(0x7), 11);
        assert_eq!(state.index, 8);
        // step 16: 2 + 16 = 18 subtracted
        assert_eq!(state.decode_nibble(0xC), -7);
        assert_eq!(state.index, 10);
    }

    #[test]
    fn test_header_seeds_predictor() {
        let mut decoder = decoder();
        // predicted 1000, index 0, then codes 0 and 8 which move by 7 >> 3 = 0
        let out = decoder.decode(&[0x03, 0xE8, 0x00, 0x00, 0x08]).unwrap();
        assert_eq!(out, vec![1000, 1000]);
    }

    #[test]
    fn test_two_samples_per_byte() {
        let mut decoder = decoder();
        let out = decoder.decode(&[0, 0, 0, 0, 0x12, 0x34, 0x56]).unwrap();
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn test_bad_header() {
        let mut decoder = decoder();
        assert!(matches!(
            decoder.decode(&[0, 0]),
            Err(CodecError::InvalidPayload { .. })
        ));
        assert!(decoder.decode(&[0, 0, 89, 0]).is_err());
    }
}
