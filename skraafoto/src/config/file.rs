//! Configuration file handling for ~/.skraafoto/config.ini.
//!
//! Settings structs live in [`super::settings`], parsing in [`super::parser`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use super::settings::*;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load configuration from the default path (~/.skraafoto/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults. Secrets found in the
    /// environment override the file either way.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let mut config = if path.exists() {
            let ini = Ini::load_from_file(path)?;
            super::parser::parse_ini(&ini)?
        } else {
            Self::default()
        };

        super::parser::apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }
}

/// Get the path to the config directory (~/.skraafoto).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skraafoto")
}

/// Get the path to the config file (~/.skraafoto/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
