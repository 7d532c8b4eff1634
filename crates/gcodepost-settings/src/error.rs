//! Error types for the settings crate.

use std::io;
use thiserror::Error;

/// Errors that can occur while loading or saving tool settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The settings file is not valid TOML for [`ToolSettings`](crate::ToolSettings).
    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// The settings could not be serialized.
    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// A setting value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// No platform configuration directory is known.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),
}

impl SettingsError {
    /// Create an invalid setting error
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
