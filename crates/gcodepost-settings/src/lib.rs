//! GCodePost Settings Crate
//!
//! Persisted defaults for the options of each post-processing tool.

pub mod config;
pub mod error;

pub use config::{
    default_path, BlipRemoverSettings, GapCloserSettings, ToolSettings, TravelMultiplierSettings,
    WipeHopSettings,
};
pub use error::{SettingsError, SettingsResult};
