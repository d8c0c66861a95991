//! # Client Configuration
//!
//! TOML, every field optional:
//!
//! ```toml
//! resync_policy = "replace"     # or "reject"
//! decode_failure = "skip_input" # or "abort_batch"
//! send_inputs = true
//! log_filter = "lockstep_client=debug"
//!
//! [viewport]
//! width = 1280
//! height = 720
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::Viewport;
use crate::sequencer::ResyncPolicy;
use crate::stepper::DecodeFailurePolicy;

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// OS detail.
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML, or a field has the wrong type.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed, but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Handling of a Baseline on an already synced connection.
    pub resync_policy: ResyncPolicy,
    /// Handling of input bytes the engine cannot decode.
    pub decode_failure: DecodeFailurePolicy,
    /// Whether the driver sends local input after each applied frame.
    pub send_inputs: bool,
    /// Surface size passed to render sinks.
    pub viewport: Viewport,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            resync_policy: ResyncPolicy::Reject,
            decode_failure: DecodeFailurePolicy::AbortBatch,
            send_inputs: true,
            viewport: Viewport::default(),
            log_filter: "warn".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid("viewport width and height must be > 0".to_string()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".to_string()));
        }
        Ok(())
    }

    /// Installs the global subscriber with `log_filter` as the fallback
    /// filter. Returns `false` if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        crate::logging::init(&self.log_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_policies_parse() {
        let config = ClientConfig::from_toml_str(
            r#"
            resync_policy = "replace"
            decode_failure = "skip_input"
            send_inputs = false

            [viewport]
            width = 1280
            height = 720
            "#,
        )
        .unwrap();

        assert_eq!(config.resync_policy, ResyncPolicy::Replace);
        assert_eq!(config.decode_failure, DecodeFailurePolicy::SkipInput);
        assert!(!config.send_inputs);
        assert_eq!(config.viewport, Viewport { width: 1280, height: 720 });
    }

    #[test]
    fn test_zero_viewport_rejected() {
        let err = ClientConfig::from_toml_str("[viewport]\nwidth = 0\nheight = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(matches!(
            ClientConfig::from_toml_str("resync_policy = \"merge\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_returns_default() {
        let temp = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&temp.path().join("missing.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("client.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.resync_policy, ResyncPolicy::Reject);
    }

    #[test]
    fn test_init_logging_uses_configured_filter() {
        let config = ClientConfig::from_toml_str("log_filter = \"lockstep_client=debug\"").unwrap();
        config.init_logging();
        // The global subscriber is installed at most once per process.
        assert!(!config.init_logging());
        assert!(!crate::logging::init("warn"));
    }
}
