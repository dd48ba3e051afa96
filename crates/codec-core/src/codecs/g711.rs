//! G.711 μ-law and A-law
//!
//! Expansion and compression follow the ITU-T STL reference module, so
//! decoded samples are bit-exact with other G.711 implementations.
//!
//! ### A-law
//! - 13 most significant bits of the linear sample
//! - even bits toggled (XOR with 0x55)
//!
//! ### μ-law
//! - 14 most significant bits of the linear sample
//! - bias of 33 (0x21), ones' complement on the wire

use crate::error::Result;
use crate::types::{AudioDecoder, CodecInfo};

/// A-law compression according to ITU-T G.711
pub fn alaw_compress(sample: i16) -> u8 {
    let mut ix = if sample < 0 {
        (((!sample) as u16) >> 4) as i16
    } else {
        sample >> 4
    };

    if ix > 15 {
        let mut iexp = 1;
        while ix > 16 + 15 {
            ix >>= 1;
            iexp += 1;
        }
        ix -= 16;
        ix += iexp << 4;
    }

    if sample >= 0 {
        ix |= 0x0080;
    }

    (ix ^ 0x0055) as u8
}

/// A-law expansion according to ITU-T G.711
pub fn alaw_expand(compressed: u8) -> i16 {
    let ix = i16::from(compressed ^ 0x55) & 0x007F;
    let iexp = ix >> 4;
    let mut mant = ix & 0x000F;

    if iexp > 0 {
        mant += 16;
    }
    mant = (mant << 4) + 0x0008;
    if iexp > 1 {
        mant <<= iexp - 1;
    }

    if compressed > 127 {
        mant
    } else {
        -mant
    }
}

/// μ-law compression according to ITU-T G.711
pub fn ulaw_compress(sample: i16) -> u8 {
    let absno = if sample < 0 {
        (((!sample) as u16) >> 2) as i16 + 33
    } else {
        (sample >> 2) + 33
    };
    let absno = absno.min(0x1FFF);

    let mut i = absno >> 6;
    let mut segno = 1;
    while i != 0 {
        segno += 1;
        i >>= 1;
    }

    let high_nibble = 0x0008 - segno;
    let low_nibble = 0x000F - ((absno >> segno) & 0x000F);
    let mut result = (high_nibble << 4) | low_nibble;
    if sample >= 0 {
        result |= 0x0080;
    }

    result as u8
}

/// μ-law expansion according to ITU-T G.711
pub fn ulaw_expand(compressed: u8) -> i16 {
    let sign = if compressed < 0x80 { -1 } else { 1 };
    let inverted = i16::from(!compressed);
    let exponent = (inverted >> 4) & 0x0007;
    let mantissa = inverted & 0x000F;
    let step = 4 << (exponent + 1);

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// Companding law of a G.711 stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum G711Law {
    /// μ-law, payload type 0
    Mu,
    /// A-law, payload type 8
    A,
}

/// G.711 decoder; one byte per sample, no state
#[derive(Debug, Clone)]
pub struct G711Decoder {
    law: G711Law,
    info: CodecInfo,
}

impl G711Decoder {
    pub fn new(law: G711Law, info: CodecInfo) -> Self {
        Self { law, info }
    }

    pub fn pcmu() -> Self {
        Self::new(
            G711Law::Mu,
            CodecInfo {
                name: "PCMU",
                sample_rate: 8000,
                channels: 1,
                payload_type: Some(0),
            },
        )
    }

    pub fn pcma() -> Self {
        Self::new(
            G711Law::A,
            CodecInfo {
                name: "PCMA",
                sample_rate: 8000,
                channels: 1,
                payload_type: Some(8),
            },
        )
    }

    pub fn law(&self) -> G711Law {
        self.law
    }
}

impl AudioDecoder for G711Decoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        let expand = match self.law {
            G711Law::Mu => ulaw_expand,
            G711Law::A => alaw_expand,
        };
        Ok(payload.iter().map(|&byte| expand(byte)).collect())
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // Test cases from ITU-T reference implementation
        assert_eq!(alaw_compress(0), 0xd5);
        assert_eq!(alaw_compress(1024), 0xe5);
        assert_eq!(alaw_compress(-1024), 0x7a);
        assert_eq!(ulaw_compress(0), 0xff);
        assert_eq!(ulaw_compress(1024), 0xcd);
        assert_eq!(ulaw_compress(-128), 0x6f);

        assert_eq!(alaw_expand(0xd5), 8);
        assert_eq!(alaw_expand(0xdd), 136);
        assert_eq!(alaw_expand(0x52), -120);
        assert_eq!(ulaw_expand(0xff), 0);
        assert_eq!(ulaw_expand(0xef), 132);
        assert_eq!(ulaw_expand(0x4d), -1052);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(ulaw_expand(0x00), -32124);
        assert_eq!(ulaw_expand(0x80), 32124);
        assert_eq!(alaw_expand(0xAA), 32256);
        assert_eq!(alaw_expand(0x2A), -32256);
    }

    #[test]
    fn test_decoder_one_sample_per_byte() {
        let mut decoder = G711Decoder::pcma();
        let samples = decoder.decode(&[0xd5; 160]).unwrap();
        assert_eq!(samples.len(), 160);
        assert!(samples.iter().all(|&s| s == 8));

        let mut decoder = G711Decoder::pcmu();
        assert_eq!(decoder.decode(&[0xff, 0xef]).unwrap(), vec![0, 132]);
        assert_eq!(decoder.info().payload_type, Some(0));
    }

    #[test]
    fn test_companding_error_is_bounded() {
        for sample in (-32000i16..32000).step_by(97) {
            let mu = ulaw_expand(ulaw_compress(sample));
            let a = alaw_expand(alaw_compress(sample));
            let bound = (i32::from(sample).abs() / 16).max(16);
            assert!((i32::from(mu) - i32::from(sample)).abs() <= bound, "μ-law {}", sample);
            assert!((i32::from(a) - i32::from(sample)).abs() <= bound, "A-law {}", sample);
        }
    }
}
