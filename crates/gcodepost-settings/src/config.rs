//! Per-tool default options
//!
//! Defaults are stored as TOML in the platform configuration directory,
//! one section per tool:
//!
//! ```toml
//! [gap_closer]
//! back_up_distance = 1.0
//!
//! [wipe_hop]
//! lift_z = 0.4
//! ```
//!
//! Missing sections and keys fall back to the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SettingsError, SettingsResult};

/// Directory name under the platform configuration directory
const APP_DIR: &str = "gcodepost";

/// Settings file name
const FILE_NAME: &str = "settings.toml";

/// Default settings file location
pub fn default_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })
}

/// Gap closer defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapCloserSettings {
    /// How far to back up the start of an extrusion, in mm
    pub back_up_distance: f64,
}

impl Default for GapCloserSettings {
    fn default() -> Self {
        Self {
            back_up_distance: 1.0,
        }
    }
}

/// Travel extrusion multiplier defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelMultiplierSettings {
    /// Extrusion multiplier applied after a travel
    pub multiplier: f64,
    /// Extrusion distance the multiplier covers, in mm
    pub distance: f64,
}

impl Default for TravelMultiplierSettings {
    fn default() -> Self {
        Self {
            multiplier: 1.1,
            distance: 1.0,
        }
    }
}

/// Blip remover defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlipRemoverSettings {
    /// Travel distance above which a retraction is required
    /// (the slicer's `retract_before_travel` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wipe_threshold: Option<f64>,
}

/// Wipe hop defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeHopSettings {
    /// Height to lift during the travel, in mm
    pub lift_z: f64,
    /// Wipe distance as a multiple of the nozzle diameter
    pub wipe_multiplier: f64,
    /// Travel distance above which the wipe and hop is added
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wipe_threshold: Option<f64>,
}

impl Default for WipeHopSettings {
    fn default() -> Self {
        Self {
            lift_z: 0.2,
            wipe_multiplier: 2.0,
            wipe_threshold: None,
        }
    }
}

/// Defaults for every tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// `[gap_closer]` section
    pub gap_closer: GapCloserSettings,
    /// `[travel_multiplier]` section
    pub travel_multiplier: TravelMultiplierSettings,
    /// `[blip_remover]` section
    pub blip_remover: BlipRemoverSettings,
    /// `[wipe_hop]` section
    pub wipe_hop: WipeHopSettings,
}

impl ToolSettings {
    /// Create settings with the built-in defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    ///
    /// A missing file yields the built-in defaults.
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        debug!("Loaded tool settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a TOML file, creating its directory if needed
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> SettingsResult<()> {
        let positive = [
            ("gap_closer.back_up_distance", self.gap_closer.back_up_distance),
            ("travel_multiplier.multiplier", self.travel_multiplier.multiplier),
            ("travel_multiplier.distance", self.travel_multiplier.distance),
            ("wipe_hop.wipe_multiplier", self.wipe_hop.wipe_multiplier),
        ];
        for (key, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(SettingsError::invalid(key, "must be > 0"));
            }
        }

        if self.wipe_hop.lift_z < 0.0 {
            return Err(SettingsError::invalid("wipe_hop.lift_z", "must be >= 0"));
        }

        let thresholds = [
            ("blip_remover.wipe_threshold", self.blip_remover.wipe_threshold),
            ("wipe_hop.wipe_threshold", self.wipe_hop.wipe_threshold),
        ];
        for (key, value) in thresholds {
            if value.is_some_and(|v| v < 0.0) {
                return Err(SettingsError::invalid(key, "must be >= 0"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ToolSettings::new();
        assert_eq!(settings.gap_closer.back_up_distance, 1.0);
        assert_eq!(settings.travel_multiplier.multiplier, 1.1);
        assert_eq!(settings.wipe_hop.lift_z, 0.2);
        assert!(settings.blip_remover.wipe_threshold.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let settings: ToolSettings = toml::from_str("[wipe_hop]\nlift_z = 0.4\n").unwrap();
        assert_eq!(settings.wipe_hop.lift_z, 0.4);
        assert_eq!(settings.wipe_hop.wipe_multiplier, 2.0);
        assert_eq!(settings.gap_closer, GapCloserSettings::default());
    }

    #[test]
    fn test_validation() {
        let mut settings = ToolSettings::new();
        settings.travel_multiplier.multiplier = 0.0;
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid setting 'travel_multiplier.multiplier': must be > 0"
        );

        let mut settings = ToolSettings::new();
        settings.wipe_hop.wipe_threshold = Some(-1.0);
        assert!(settings.validate().is_err());

        let mut settings = ToolSettings::new();
        settings.gap_closer.back_up_distance = f64::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_default_path() {
        if let Ok(path) = default_path() {
            assert!(path.ends_with("gcodepost/settings.toml"));
        }
    }
}
