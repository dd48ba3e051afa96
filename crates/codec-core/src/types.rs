//! Core types and traits for the codec library

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoder for one RTP payload format
///
/// Decoders are stateful (ADPCM predictors, QMF delay lines) and belong to
/// a single stream.
pub trait AudioDecoder: Send {
    /// Decode one packet payload to interleaved 16-bit PCM
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed. The decoder stays
    /// usable for the next packet.
    fn decode(&mut self, payload: &[u8]) -> Result<Vec<i16>>;

    /// Get codec information
    fn info(&self) -> CodecInfo;

    /// Clear all internal state
    fn reset(&mut self);
}

/// Audio codec information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    /// Codec name (e.g., "PCMU", "PCMA", "G722")
    pub name: &'static str,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// RTP payload type (if standard)
    pub payload_type: Option<u8>,
}

/// Payload encodings known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecType {
    /// G.711 μ-law (PCMU)
    G711Pcmu,
    /// G.711 A-law (PCMA)
    G711Pcma,
    /// G.722 wideband
    G722,
    /// Linear 16-bit PCM, network byte order
    L16,
    /// IMA ADPCM
    Dvi4,
    /// Comfort noise (RFC 3389)
    ComfortNoise,
    /// DTMF events (RFC 4733)
    TelephoneEvent,
    Gsm,
    G723,
    Lpc,
    Qcelp,
    Mpa,
    G728,
    G729,
}

impl CodecType {
    /// Get the encoding name as used in SDP
    pub fn name(self) -> &'static str {
        match self {
            Self::G711Pcmu => "PCMU",
            Self::G711Pcma => "PCMA",
            Self::G722 => "G722",
            Self::L16 => "L16",
            Self::Dvi4 => "DVI4",
            Self::ComfortNoise => "CN",
            Self::TelephoneEvent => "telephone-event",
            Self::Gsm => "GSM",
            Self::G723 => "G723",
            Self::Lpc => "LPC",
            Self::Qcelp => "QCELP",
            Self::Mpa => "MPA",
            Self::G728 => "G728",
            Self::G729 => "G729",
        }
    }

    /// Look up an encoding name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        let codec = match upper.as_str() {
            "PCMU" => Self::G711Pcmu,
            "PCMA" => Self::G711Pcma,
            "G722" => Self::G722,
            "L16" => Self::L16,
            "DVI4" => Self::Dvi4,
            "CN" => Self::ComfortNoise,
            "TELEPHONE-EVENT" => Self::TelephoneEvent,
            "GSM" => Self::Gsm,
            "G723" => Self::G723,
            "LPC" => Self::Lpc,
            "QCELP" => Self::Qcelp,
            "MPA" => Self::Mpa,
            "G728" => Self::G728,
            "G729" => Self::G729,
            _ => return None,
        };
        Some(codec)
    }

    /// Whether a decoder exists for this encoding
    pub fn is_decodable(self) -> bool {
        matches!(
            self,
            Self::G711Pcmu
                | Self::G711Pcma
                | Self::G722
                | Self::L16
                | Self::Dvi4
                | Self::ComfortNoise
                | Self::TelephoneEvent
        )
    }

    /// Whether packets carry audio samples (comfort noise and events do not)
    pub fn carries_audio(self) -> bool {
        !matches!(self, Self::ComfortNoise | Self::TelephoneEvent)
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Description of one RTP payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadFormat {
    /// RTP payload type number
    pub payload_type: u8,
    /// Encoding
    pub codec: CodecType,
    /// RTP timestamp clock rate
    pub clock_rate: u32,
    /// Decoded audio sample rate (differs from the clock for G.722)
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// Default packet duration in milliseconds
    pub ptime_ms: u32,
}

impl PayloadFormat {
    pub const fn new(payload_type: u8, codec: CodecType, clock_rate: u32, channels: u8) -> Self {
        let sample_rate = match codec {
            CodecType::G722 => 16000,
            _ => clock_rate,
        };
        let ptime_ms = match codec {
            CodecType::G723 => 30,
            _ => 20,
        };
        Self {
            payload_type,
            codec,
            clock_rate,
            sample_rate,
            channels,
            ptime_ms,
        }
    }

    /// RTP timestamp ticks of one default-length packet
    pub fn default_frame_ticks(&self) -> u32 {
        (u64::from(self.clock_rate) * u64::from(self.ptime_ms) / 1000) as u32
    }

    /// Per-channel output samples of one default-length packet
    pub fn default_frame_samples(&self) -> usize {
        (u64::from(self.sample_rate) * u64::from(self.ptime_ms) / 1000) as usize
    }

    /// Codec information for a decoder of this format
    pub fn info(&self) -> CodecInfo {
        CodecInfo {
            name: self.codec.name(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            payload_type: Some(self.payload_type),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.codec, self.clock_rate)?;
        if self.channels > 1 {
            write!(f, "/{}", self.channels)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_names() {
        for codec in [CodecType::G711Pcmu, CodecType::G722, CodecType::Dvi4, CodecType::G729] {
            assert_eq!(CodecType::from_name(codec.name()), Some(codec));
        }
        assert_eq!(CodecType::from_name("pcma"), Some(CodecType::G711Pcma));
        assert_eq!(CodecType::from_name("opus"), None);
    }

    #[test]
    fn test_g722_rates() {
        let format = PayloadFormat::new(9, CodecType::G722, 8000, 1);
        assert_eq!(format.sample_rate, 16000);
        assert_eq!(format.default_frame_ticks(), 160);
        assert_eq!(format.default_frame_samples(), 320);
        assert_eq!(format.to_string(), "G722/8000");
    }

    #[test]
    fn test_l16_stereo_display() {
        let format = PayloadFormat::new(10, CodecType::L16, 44100, 2);
        assert_eq!(format.to_string(), "L16/44100/2");
        assert_eq!(format.default_frame_samples(), 882);
    }
}
