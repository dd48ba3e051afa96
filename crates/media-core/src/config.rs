//! Engine configuration
//!
//! Every section has serde defaults, so a partial TOML file (or none at
//! all) yields a working configuration.
//!
//! ```toml
//! [classifier]
//! min_port = 1024
//!
//! [sequencer]
//! min_packets = 2
//! min_monotonic_ratio = 0.5
//!
//! [[decoder.dynamic_payload_types]]
//! payload_type = 96
//! encoding = "PCMU"
//! clock_rate = 8000
//!
//! [export]
//! min_duration_secs = 2.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use voipspy_codec_core::{DynamicPayloadType, PayloadTypeRegistry};
use voipspy_rtp_core::ClassifierConfig;

use crate::error::{Error, Result};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub sequencer: SequencerConfig,
    pub decoder: DecoderConfig,
    pub export: ExportConfig,
    pub transcription: TranscriptionConfig,
    pub capture: CaptureConfig,
}

impl EngineConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and the dynamic payload type mappings
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sequencer.min_monotonic_ratio) {
            return Err(Error::config(format!(
                "sequencer.min_monotonic_ratio must be within 0..=1, got {}",
                self.sequencer.min_monotonic_ratio
            )));
        }
        if self.sequencer.max_forward_step == 0 {
            return Err(Error::config("sequencer.max_forward_step must be positive"));
        }
        if self.export.min_duration_secs < 0.0 {
            return Err(Error::config("export.min_duration_secs must not be negative"));
        }
        if self.transcription.timeout_secs == 0 {
            return Err(Error::config("transcription.timeout_secs must be positive"));
        }
        self.decoder.registry()?;
        Ok(())
    }
}

/// Ordering and confidence thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Streams with fewer packets are flagged low confidence
    pub min_packets: usize,
    /// Minimum share of arrival-adjacent packets that step forward
    pub min_monotonic_ratio: f64,
    /// Largest sequence step still counted as "forward"
    pub max_forward_step: u16,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            min_packets: 2,
            min_monotonic_ratio: 0.5,
            max_forward_step: 100,
        }
    }
}

/// Payload decoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest silence inserted for a gap or a timestamp jump; beyond it the
    /// timeline is rebased onto the next packet
    pub max_silence_fill_ms: u32,
    /// Mappings for dynamic payload types (96-127)
    pub dynamic_payload_types: Vec<DynamicPayloadType>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_silence_fill_ms: 10_000,
            dynamic_payload_types: vec![DynamicPayloadType::new(101, "telephone-event", 8000)],
        }
    }
}

impl DecoderConfig {
    /// Payload type registry with the configured dynamic mappings
    pub fn registry(&self) -> Result<PayloadTypeRegistry> {
        Ok(PayloadTypeRegistry::with_dynamic(&self.dynamic_payload_types)?)
    }
}

/// Output file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Streams shorter than this are not exported
    pub min_duration_secs: f64,
    /// Skip artifacts whose samples equal an already exported one
    pub deduplicate: bool,
    /// Also write a stereo mix of the first two streams
    pub merge: bool,
    /// File name prefix for per-stream WAV files
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.0,
            deduplicate: true,
            merge: false,
            file_prefix: "rtp_stream".to_string(),
        }
    }
}

/// Speech-to-text endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:8000/v1`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: "whisper-1".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Live capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub interface: String,
    /// tshark executable
    pub program: String,
    pub output_dir: PathBuf,
    /// Seconds tshark gets to flush after SIGTERM before it is killed
    pub stop_grace_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: "any".to_string(),
            program: "tshark".to_string(),
            output_dir: PathBuf::from("captures"),
            stop_grace_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voipspy_codec_core::CodecType;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.classifier.min_port, 1024);
        assert_eq!(config.export.min_duration_secs, 0.0);
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml(
            r#"
            [sequencer]
            min_packets = 5

            [[decoder.dynamic_payload_types]]
            payload_type = 96
            encoding = "PCMA"
            clock_rate = 8000

            [export]
            min_duration_secs = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sequencer.min_packets, 5);
        assert_eq!(config.sequencer.min_monotonic_ratio, 0.5);
        assert_eq!(config.export.min_duration_secs, 2.0);
        let registry = config.decoder.registry().unwrap();
        assert_eq!(registry.format(96).unwrap().codec, CodecType::G711Pcma);
        assert!(registry.get(101).is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(EngineConfig::from_toml("[sequencer]\nmin_monotonic_ratio = 1.5").is_err());
        assert!(EngineConfig::from_toml(
            "[[decoder.dynamic_payload_types]]\npayload_type = 8\nencoding = \"PCMU\"\nclock_rate = 8000"
        )
        .is_err());
        assert!(EngineConfig::from_toml("[classifier]\nmin_port = \"high\"").is_err());
    }
}
