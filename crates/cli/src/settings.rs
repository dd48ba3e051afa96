//! Configuration loading
//!
//! Layers, later ones win: built-in defaults, an optional TOML file, then
//! `VOIPSPY__<SECTION>__<KEY>` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::{debug, info};
use voipspy_media_core::EngineConfig;

pub const ENV_PREFIX: &str = "VOIPSPY";

/// Load the engine configuration
pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
    load_with_env(path, Environment::with_prefix(ENV_PREFIX))
}

fn load_with_env(path: Option<&Path>, environment: Environment) -> Result<EngineConfig> {
    let defaults = Config::try_from(&EngineConfig::default()).context("failed to serialize defaults")?;
    let mut builder = Config::builder().add_source(defaults);

    if let Some(path) = path {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    let settings = builder
        .add_source(environment.separator("__").try_parsing(true))
        .build()
        .context("failed to load configuration")?;
    let config: EngineConfig = settings
        .try_deserialize()
        .context("invalid configuration")?;
    config.validate()?;

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use temp_dir::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = load_with_env(None, vars(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_file_then_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("voip-spy.toml");
        std::fs::write(
            &path,
            "[export]\nmin_duration_secs = 2.0\nmerge = true\n\n[sequencer]\nmin_packets = 4\n",
        )
        .unwrap();

        let config = load_with_env(
            Some(&path),
            vars(&[("VOIPSPY__SEQUENCER__MIN_PACKETS", "9")]),
        )
        .unwrap();
        assert_eq!(config.export.min_duration_secs, 2.0);
        assert!(config.export.merge);
        assert_eq!(config.sequencer.min_packets, 9);
        assert_eq!(config.export.file_prefix, "rtp_stream");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_with_env(Some(&dir.path().join("absent.toml")), vars(&[])).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = load_with_env(None, vars(&[("VOIPSPY__SEQUENCER__MIN_MONOTONIC_RATIO", "3.0")]));
        assert!(result.is_err());
    }
}
