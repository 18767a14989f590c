//! Engine configuration
//!
//! Loaded from a TOML file (conventionally `sema.toml` next to the project
//! manifest); every key is optional and falls back to its default.
//!
//! ```toml
//! default_int_width = 32
//! default_float_width = 64
//! index_width = 64
//! trace_substitutions = false
//! log_level = "info"
//! ```
//!
//! # Usage
//!
//! ```rust
//! use sema_core::util::config::InferConfig;
//!
//! let config = InferConfig::from_toml_str("default_int_width = 64").unwrap();
//! assert_eq!(config.default_int_width, 64);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::logger::LogLevel;

/// Widths accepted for integer types
pub const INT_WIDTHS: [u32; 4] = [8, 16, 32, 64];
/// Widths accepted for float types
pub const FLOAT_WIDTHS: [u32; 2] = [32, 64];

/// Configuration of a typing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferConfig {
    /// Width given to integer literals without a suffix (always signed)
    #[serde(default = "default_int_width")]
    pub default_int_width: u32,
    /// Width given to float literals without a suffix
    #[serde(default = "default_float_width")]
    pub default_float_width: u32,
    /// Width of the unsigned integer an unconstrained index defaults to
    #[serde(default = "default_index_width")]
    pub index_width: u32,
    /// Log every composed substitution at trace level
    #[serde(default)]
    pub trace_substitutions: bool,
    /// Level used by `util::logger` when the embedding tool lets the engine
    /// set up logging
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_int_width() -> u32 {
    32
}

fn default_float_width() -> u32 {
    64
}

fn default_index_width() -> u32 {
    64
}

impl Default for InferConfig {
    fn default() -> Self {
        Self {
            default_int_width: default_int_width(),
            default_float_width: default_float_width(),
            index_width: default_index_width(),
            trace_substitutions: false,
            log_level: LogLevel::default(),
        }
    }
}

impl InferConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: InferConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if it exists, the defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Render the configuration back to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    /// Check every width against the supported set
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !INT_WIDTHS.contains(&self.default_int_width) {
            return Err(ConfigError::InvalidWidth {
                key: "default_int_width",
                width: self.default_int_width,
            });
        }
        if !INT_WIDTHS.contains(&self.index_width) {
            return Err(ConfigError::InvalidWidth {
                key: "index_width",
                width: self.index_width,
            });
        }
        if !FLOAT_WIDTHS.contains(&self.default_float_width) {
            return Err(ConfigError::InvalidWidth {
                key: "default_float_width",
                width: self.default_float_width,
            });
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ParseError(toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeError(toml::ser::Error),
    #[error("unsupported width {width} for `{key}`")]
    InvalidWidth { key: &'static str, width: u32 },
}
