//! TOML configuration file loading.
//!
//! Every key is optional; missing keys keep their [`RelayConfig::default`]
//! value and unknown keys are rejected so typos do not go unnoticed.
//!
//! ```toml
//! bind_addr = "127.0.0.1:3000"
//! direct_path = "/ws"
//! channel_path = "/channel"
//! queue_capacity = 10
//! read_buffer_size = 1024
//! echo_to_sender = true
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::{InvalidConfig, RelayConfig};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] InvalidConfig),
}

/// Parses and validates a config from TOML text.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML or unknown keys,
/// [`ConfigError::Invalid`] for values that fail [`RelayConfig::validate`].
pub fn parse_config(content: &str) -> Result<RelayConfig, ConfigError> {
    let config: RelayConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads a config file the user asked for explicitly.
///
/// A missing file is an error here: unlike a default location, an explicit
/// path that does not exist is almost certainly a mistake.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, otherwise as
/// [`parse_config`].
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
