//! Payload type registry
//!
//! Static assignments come from RFC 3551 table 4. Dynamic payload types
//! (96-127) have no meaning without signalling, so they are only decoded
//! when the operator supplies a mapping.

use crate::codecs::CodecFactory;
use crate::error::{CodecError, Result};
use crate::types::{AudioDecoder, CodecType, PayloadFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// First dynamic payload type
pub const DYNAMIC_PT_START: u8 = 96;
/// Last dynamic payload type
pub const DYNAMIC_PT_END: u8 = 127;

const STATIC_FORMATS: [PayloadFormat; 17] = [
    PayloadFormat::new(0, CodecType::G711Pcmu, 8000, 1),
    PayloadFormat::new(3, CodecType::Gsm, 8000, 1),
    PayloadFormat::new(4, CodecType::G723, 8000, 1),
    PayloadFormat::new(5, CodecType::Dvi4, 8000, 1),
    PayloadFormat::new(6, CodecType::Dvi4, 16000, 1),
    PayloadFormat::new(7, CodecType::Lpc, 8000, 1),
    PayloadFormat::new(8, CodecType::G711Pcma, 8000, 1),
    PayloadFormat::new(9, CodecType::G722, 8000, 1),
    PayloadFormat::new(10, CodecType::L16, 44100, 2),
    PayloadFormat::new(11, CodecType::L16, 44100, 1),
    PayloadFormat::new(12, CodecType::Qcelp, 8000, 1),
    PayloadFormat::new(13, CodecType::ComfortNoise, 8000, 1),
    PayloadFormat::new(14, CodecType::Mpa, 90000, 1),
    PayloadFormat::new(15, CodecType::G728, 8000, 1),
    PayloadFormat::new(16, CodecType::Dvi4, 11025, 1),
    PayloadFormat::new(17, CodecType::Dvi4, 22050, 1),
    PayloadFormat::new(18, CodecType::G729, 8000, 1),
];

fn default_channels() -> u8 {
    1
}

/// Operator-supplied mapping for a dynamic payload type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicPayloadType {
    pub payload_type: u8,
    /// SDP encoding name, e.g. "PCMU" or "telephone-event"
    pub encoding: String,
    pub clock_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
}

impl DynamicPayloadType {
    pub fn new(payload_type: u8, encoding: impl Into<String>, clock_rate: u32) -> Self {
        Self {
            payload_type,
            encoding: encoding.into(),
            clock_rate,
            channels: 1,
        }
    }

    fn to_format(&self) -> Result<PayloadFormat> {
        if !(DYNAMIC_PT_START..=DYNAMIC_PT_END).contains(&self.payload_type) {
            return Err(CodecError::invalid_config(format!(
                "payload type {} is outside the dynamic range {}-{}",
                self.payload_type, DYNAMIC_PT_START, DYNAMIC_PT_END
            )));
        }
        let codec = CodecType::from_name(&self.encoding).ok_or_else(|| {
            CodecError::invalid_config(format!("unknown encoding name {:?}", self.encoding))
        })?;
        if self.clock_rate == 0 || self.channels == 0 {
            return Err(CodecError::invalid_config(format!(
                "payload type {}: clock rate and channel count must be positive",
                self.payload_type
            )));
        }
        Ok(PayloadFormat::new(self.payload_type, codec, self.clock_rate, self.channels))
    }
}

/// Maps RTP payload type numbers to payload formats
#[derive(Debug, Clone)]
pub struct PayloadTypeRegistry {
    formats: BTreeMap<u8, PayloadFormat>,
}

impl Default for PayloadTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadTypeRegistry {
    /// Registry holding the static RFC 3551 assignments
    pub fn new() -> Self {
        let formats = STATIC_FORMATS
            .iter()
            .map(|format| (format.payload_type, *format))
            .collect();
        Self { formats }
    }

    /// Static assignments plus the given dynamic mappings
    pub fn with_dynamic(mappings: &[DynamicPayloadType]) -> Result<Self> {
        let mut registry = Self::new();
        for mapping in mappings {
            registry.register(mapping)?;
        }
        Ok(registry)
    }

    /// Add or replace a dynamic mapping
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::InvalidConfig`] for payload types outside
    /// 96-127, unknown encoding names and zero rates or channel counts.
    pub fn register(&mut self, mapping: &DynamicPayloadType) -> Result<()> {
        let format = mapping.to_format()?;
        debug!("Registered dynamic payload type {} as {}", format.payload_type, format);
        self.formats.insert(format.payload_type, format);
        Ok(())
    }

    /// Look up a payload type
    pub fn get(&self, payload_type: u8) -> Option<&PayloadFormat> {
        self.formats.get(&payload_type)
    }

    /// Look up a payload type, failing for unmapped numbers
    pub fn format(&self, payload_type: u8) -> Result<PayloadFormat> {
        self.get(payload_type)
            .copied()
            .ok_or(CodecError::UnknownPayloadType { payload_type })
    }

    /// Create a decoder for a payload type
    pub fn create_decoder(&self, payload_type: u8) -> Result<Box<dyn AudioDecoder>> {
        CodecFactory::create_decoder(&self.format(payload_type)?)
    }

    /// Whether packets of this payload type can be decoded
    pub fn is_decodable(&self, payload_type: u8) -> bool {
        self.get(payload_type)
            .map_or(false, |format| format.codec.is_decodable())
    }

    /// All known formats, ordered by payload type
    pub fn iter(&self) -> impl Iterator<Item = &PayloadFormat> {
        self.formats.values()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }
}
