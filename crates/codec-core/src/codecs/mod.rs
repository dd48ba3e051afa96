//! Decoder implementations and factory

use crate::error::{CodecError, Result};
use crate::types::{AudioDecoder, CodecType, PayloadFormat};

pub mod cn;
pub mod dvi4;
pub mod event;
pub mod g711;
pub mod g722;
pub mod l16;

pub use cn::ComfortNoiseDecoder;
pub use dvi4::Dvi4Decoder;
pub use event::{TelephoneEvent, TelephoneEventDecoder};
pub use g711::{G711Decoder, G711Law};
pub use g722::G722Decoder;
pub use l16::L16Decoder;

/// Decoder factory
pub struct CodecFactory;

impl CodecFactory {
    /// Create a fresh decoder for a payload format
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedCodec`] for recognised encodings
    /// that have no decoder (GSM, G.729, ...).
    pub fn create_decoder(format: &PayloadFormat) -> Result<Box<dyn AudioDecoder>> {
        let info = format.info();
        let decoder: Box<dyn AudioDecoder> = match format.codec {
            CodecType::G711Pcmu => Box::new(G711Decoder::new(G711Law::Mu, info)),
            CodecType::G711Pcma => Box::new(G711Decoder::new(G711Law::A, info)),
            CodecType::G722 => Box::new(G722Decoder::new(info)),
            CodecType::L16 => Box::new(L16Decoder::new(info)),
            CodecType::Dvi4 => Box::new(Dvi4Decoder::new(info)),
            CodecType::ComfortNoise => Box::new(ComfortNoiseDecoder::new(info)),
            CodecType::TelephoneEvent => Box::new(TelephoneEventDecoder::new(info)),
            other => return Err(CodecError::unsupported_codec(other.name())),
        };
        Ok(decoder)
    }
}
