//! Engine settings file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use rivulet_core::{GraphContext, PatchOptions};

use crate::error::ConfigError;
use crate::validation::validate_config;

/// Settings for one rivulet engine.
///
/// Every field has a default, so a file only needs the settings it changes.
///
/// # TOML Format
///
/// ```toml
/// sample_rate = 48000.0
/// block_size = 256
/// control_block_size = 64
/// channels = 2
/// control_queue_capacity = 256
/// retire_capacity = 16
/// patch_fade_seconds = 0.05
/// allow_auto_delete = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: f64,

    /// Samples per host block.
    pub block_size: usize,

    /// Audio samples per control-rate sample.
    pub control_block_size: usize,

    /// Host output channels.
    pub channels: usize,

    /// Events a control channel buffers between blocks.
    pub control_queue_capacity: usize,

    /// Sources a patch holds for release on a control thread.
    pub retire_capacity: usize,

    /// Default patch crossfade in seconds.
    pub patch_fade_seconds: f32,

    /// Let patched sources end the graph through their done action.
    pub allow_auto_delete: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 256,
            control_block_size: 64,
            channels: 2,
            control_queue_capacity: 256,
            retire_capacity: 16,
            patch_fade_seconds: 0.05,
            allow_auto_delete: false,
        }
    }
}

impl EngineConfig {
    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "config_load: loaded engine config");
        Ok(config)
    }

    /// Parse settings from a TOML string and validate them.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the settings to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the settings to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every setting against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(validate_config(self)?)
    }

    /// Graph context for these settings.
    pub fn to_context(&self) -> Result<GraphContext, ConfigError> {
        Ok(GraphContext::new(
            self.sample_rate,
            self.block_size,
            self.control_block_size,
        )?)
    }

    /// Patch options for these settings.
    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            fade_seconds: self.patch_fade_seconds,
            retire_capacity: self.retire_capacity,
            allow_auto_delete: self.allow_auto_delete,
            ..PatchOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config = EngineConfig::from_toml("block_size = 128").unwrap();
        assert_eq!(config.block_size, 128);
        assert_eq!(config.sample_rate, 48_000.0);
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_empty_string_is_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineConfig::from_toml("block_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{err}");
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = EngineConfig::from_toml("block_size = [").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_context_matches_settings() {
        let config = EngineConfig {
            sample_rate: 44_100.0,
            block_size: 128,
            control_block_size: 32,
            ..EngineConfig::default()
        };
        let ctx = config.to_context().unwrap();
        assert_eq!(ctx.block_size(), 128);
        assert_eq!(ctx.sample_rate(), 44_100.0);
        assert_eq!(ctx.control_block_len(), 4);
    }

    #[test]
    fn test_patch_options_follow_settings() {
        let options = EngineConfig::default().patch_options();
        assert_eq!(options.fade_seconds, 0.05);
        assert_eq!(options.retire_capacity, 16);
        assert!(!options.allow_auto_delete);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig {
            channels: 1,
            patch_fade_seconds: 0.25,
            ..EngineConfig::default()
        };
        let text = config.to_toml().unwrap();
        assert!(text.contains("patch_fade_seconds = 0.25"), "{text}");
        assert_eq!(EngineConfig::from_toml(&text).unwrap(), config);
    }
}
