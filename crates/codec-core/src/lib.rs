//! # Codec-Core: RTP payload decoding for voip-spy
//!
//! Maps RTP payload types to payload formats and decodes audio payloads to
//! 16-bit PCM.
//!
//! ## Decoders
//!
//! - **G.711 (PCMU/PCMA)**: ITU-T reference expansion
//! - **G.722**: 64 kbit/s wideband, 16 kHz output on an 8 kHz RTP clock
//! - **L16**: linear PCM, network byte order, mono or interleaved stereo
//! - **DVI4**: IMA ADPCM with a per-packet state header
//! - **CN / telephone-event**: recognised, produce no samples
//!
//! Other static payload types (GSM, G.723, G.729, ...) are recognised by the
//! registry but have no decoder.
//!
//! ## Usage
//!
//! ```rust
//! use voipspy_codec_core::PayloadTypeRegistry;
//!
//! let registry = PayloadTypeRegistry::new();
//! let mut decoder = registry.create_decoder(0)?;
//! let samples = decoder.decode(&[0xFF; 160])?;
//! assert_eq!(samples.len(), 160);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codecs;
pub mod error;
pub mod registry;
pub mod types;

pub use codecs::CodecFactory;
pub use error::{CodecError, ErrorCategory, Result};
pub use registry::{DynamicPayloadType, PayloadTypeRegistry, DYNAMIC_PT_END, DYNAMIC_PT_START};
pub use types::{AudioDecoder, CodecInfo, CodecType, PayloadFormat};

/// Version information for the codec library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
