//! G.722 wideband decoder (64 kbit/s, mode 1)
//!
//! Each byte carries a 6-bit lower sub-band code and a 2-bit higher
//! sub-band code. Both bands are ADPCM-decoded at 8 kHz and recombined by
//! the receive QMF into two 16 kHz output samples.
//!
//! RTP advertises G.722 with an 8000 Hz clock (RFC 3551 section 4.5.2)
//! while the audio is sampled at 16000 Hz.

use crate::error::Result;
use crate::types::{AudioDecoder, CodecInfo};

/// Inverse quantizer for the 6-bit lower sub-band code
const QTAB6: [i32; 64] = [
    -136, -136, -136, -136, -24808, -21904, -19008, -16704, -14984, -13512, -12280, -11192, -10232,
    -9360, -8576, -7856, -7192, -6576, -6000, -5456, -4944, -4464, -4008, -3576, -3168, -2776,
    -2400, -2032, -1688, -1360, -1040, -728, 24808, 21904, 19008, 16704, 14984, 13512, 12280,
    11192, 10232, 9360, 8576, 7856, 7192, 6576, 6000, 5456, 4944, 4464, 4008, 3576, 3168, 2776,
    2400, 2032, 1688, 1360, 1040, 728, 432, 136, -432, -136,
];

/// Inverse quantizer for the 4-bit code driving the lower band predictor
const QTAB4: [i32; 16] = [
    0, -20456, -12896, -8968, -6288, -4240, -2584, -1200, 20456, 12896, 8968, 6288, 4240, 2584,
    1200, 0,
];

/// Inverse quantizer for the 2-bit higher sub-band code
const QTAB2: [i32; 4] = [-7408, -1616, 7408, 1616];

/// Log scale factor multipliers, lower band, indexed by the 4-bit code
const WLI: [i32; 16] = [
    -60, 3042, 1198, 538, 334, 172, 58, -30, 3042, 1198, 538, 334, 172, 58, -30, -60,
];

/// Log scale factor multipliers, higher band
const WHI: [i32; 4] = [798, -214, 798, -214];

/// Antilog table for scale factor adaptation
const ILB: [i32; 32] = [
    2048, 2093, 2139, 2186, 2233, 2282, 2332, 2383, 2435, 2489, 2543, 2599, 2656, 2714, 2774, 2834,
    2896, 2960, 3025, 3091, 3158, 3228, 3298, 3371, 3444, 3520, 3597, 3676, 3756, 3838, 3922, 4008,
];

/// Even taps of the 24-tap QMF; the odd taps are the same values reversed
const QMF_COEFFS: [i32; 12] = [3, -11, 12, 32, -210, 951, 3876, -805, 362, -156, 53, -11];

fn saturate(value: i32) -> i32 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX))
}

/// ADPCM state of one sub-band
#[derive(Debug, Clone, Default)]
struct Band {
    /// Signal estimate
    s: i32,
    /// Pole section output
    sp: i32,
    /// Zero section output
    sz: i32,
    /// Reconstructed signal history
    r: [i32; 3],
    /// Pole predictor coefficients
    a: [i32; 3],
    ap: [i32; 3],
    /// Partial reconstructed signal history
    p: [i32; 3],
    /// Quantized difference history
    d: [i32; 7],
    /// Zero predictor coefficients
    b: [i32; 7],
    bp: [i32; 7],
    sg: [i32; 7],
    /// Log scale factor
    nb: i32,
    /// Scale factor
    det: i32,
}

impl Band {
    fn new(det: i32) -> Self {
        Self {
            det,
            ..Self::default()
        }
    }

    /// Scale factor adaptation from the log scale factor
    fn scale(&mut self, shift_base: i32) {
        let index = ((self.nb >> 6) & 31) as usize;
        let shift = shift_base - (self.nb >> 11);
        let value = if shift < 0 {
            ILB[index] << -shift
        } else {
            ILB[index] >> shift
        };
        self.det = value << 2;
    }

    /// Predictor update (block 4 of the recommendation)
    fn adapt(&mut self, d: i32) {
        // RECONS / PARREC
        self.d[0] = d;
        self.r[0] = saturate(self.s + d);
        self.p[0] = saturate(self.sz + d);

        // UPPOL2
        for i in 0..3 {
            self.sg[i] = self.p[i] >> 15;
        }
        let wd1 = saturate(self.a[1] << 2);
        let wd2 = (if self.sg[0] == self.sg[1] { -wd1 } else { wd1 }).min(32767);
        let mut wd3 = (wd2 >> 7) + if self.sg[0] == self.sg[2] { 128 } else { -128 };
        wd3 += (self.a[2] * 32512) >> 15;
        self.ap[2] = wd3.clamp(-12288, 12288);

        // UPPOL1
        self.sg[0] = self.p[0] >> 15;
        self.sg[1] = self.p[1] >> 15;
        let wd1 = if self.sg[0] == self.sg[1] { 192 } else { -192 };
        let wd2 = (self.a[1] * 32640) >> 15;
        self.ap[1] = saturate(wd1 + wd2);
        let limit = saturate(15360 - self.ap[2]);
        self.ap[1] = self.ap[1].clamp(-limit, limit);

        // UPZERO
        let step = if d == 0 { 0 } else { 128 };
        self.sg[0] = d >> 15;
        for i in 1..7 {
            self.sg[i] = self.d[i] >> 15;
            let wd2 = if self.sg[i] == self.sg[0] { step } else { -step };
            let wd3 = (self.b[i] * 32640) >> 15;
            self.bp[i] = saturate(wd2 + wd3);
        }

        // DELAYZ / DELAYA
        for i in (1..7).rev() {
            self.d[i] = self.d[i - 1];
            self.b[i] = self.bp[i];
        }
        for i in (1..3).rev() {
            self.r[i] = self.r[i - 1];
            self.p[i] = self.p[i - 1];
            self.a[i] = self.ap[i];
        }

        // FILTEP
        let wd1 = (self.a[1] * saturate(self.r[1] + self.r[1])) >> 15;
        let wd2 = (self.a[2] * saturate(self.r[2] + self.r[2])) >> 15;
        self.sp = saturate(wd1 + wd2);

        // FILTEZ
        let mut sz = 0;
        for i in (1..7).rev() {
            sz += (self.b[i] * saturate(self.d[i] + self.d[i])) >> 15;
        }
        self.sz = saturate(sz);

        // PREDIC
        self.s = saturate(self.sp + self.sz);
    }
}

/// Stateful G.722 decoder
#[derive(Debug, Clone)]
pub struct G722Decoder {
    low: Band,
    high: Band,
    qmf: [i32; 24],
    info: CodecInfo,
}

impl G722Decoder {
    pub fn new(info: CodecInfo) -> Self {
        Self {
            low: Band::new(32),
            high: Band::new(8),
            qmf: [0; 24],
            info,
        }
    }

    fn decode_byte(&mut self, code: u8, out: &mut Vec<i16>) {
        let low_code = usize::from(code & 0x3F);
        let high_code = usize::from(code >> 6);

        // Lower sub-band: INVQBL, RECONS, LIMIT
        let dlow = (self.low.det * QTAB6[low_code]) >> 15;
        let rlow = (self.low.s + dlow).clamp(-16384, 16383);

        // INVQAL, LOGSCL, SCALEL
        let code4 = low_code >> 2;
        let dlowt = (self.low.det * QTAB4[code4]) >> 15;
        self.low.nb = (((self.low.nb * 127) >> 7) + WLI[code4]).clamp(0, 18432);
        self.low.scale(8);
        self.low.adapt(dlowt);

        // Higher sub-band: INVQAH, RECONS, LIMIT, LOGSCH, SCALEH
        let dhigh = (self.high.det * QTAB2[high_code]) >> 15;
        let rhigh = (dhigh + self.high.s).clamp(-16384, 16383);
        self.high.nb = (((self.high.nb * 127) >> 7) + WHI[high_code]).clamp(0, 22528);
        self.high.scale(10);
        self.high.adapt(dhigh);

        // Receive QMF
        self.qmf.copy_within(2.., 0);
        self.qmf[22] = rlow + rhigh;
        self.qmf[23] = rlow - rhigh;

        let mut xout1 = 0;
        let mut xout2 = 0;
        for i in 0..12 {
            xout2 += self.qmf[2 * i] * QMF_COEFFS[i];
            xout1 += self.qmf[2 * i + 1] * QMF_COEFFS[11 - i];
        }
        out.push(saturate(xout1 >> 11) as i16);
        out.push(saturate(xout2 >> 11) as i16);
    }
}

impl AudioDecoder for G722Decoder {
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>> {
        let mut out = Vec::with_capacity(payload.len() * 2);
        for &code in payload {
            self.decode_byte(code, &mut out);
        }
        Ok(out)
    }

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn reset(&mut self) {
        self.low = Band::new(32);
        self.high = Band::new(8);
        self.qmf = [0; 24];
    }
}
