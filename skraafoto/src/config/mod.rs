//! Configuration for a batch run.
//!
//! The typed options object is [`ConfigFile`], loaded from an INI file
//! (default `~/.skraafoto/config.ini`). Missing keys fall back to defaults;
//! invalid values are rejected with the offending section and key.
//!
//! # Example
//!
//! ```
//! use skraafoto::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert!(!config.crop.sizes.is_empty());
//! ```

mod file;
mod parser;
mod settings;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;

/// Environment variable overriding `[api] token`.
pub const ENV_API_TOKEN: &str = "SKRAAFOTO_API_TOKEN";
/// Environment variable overriding `[api] username`.
pub const ENV_DHM_USERNAME: &str = "SKRAAFOTO_DHM_USERNAME";
/// Environment variable overriding `[api] password`.
pub const ENV_DHM_PASSWORD: &str = "SKRAAFOTO_DHM_PASSWORD";
