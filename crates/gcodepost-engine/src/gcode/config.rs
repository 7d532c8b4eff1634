//! Slicer configuration lookup
//!
//! Slicers append their settings to the end of the G-code as comments of the
//! form `; key = value`. [`SlicerConfig`] collects them once, scanning from
//! the end of the stream, and exposes typed accessors for the settings the
//! rewrite tools depend on.

use std::collections::HashMap;
use std::fmt;

use gcodepost_core::{ConfigError, Result};
use tracing::debug;

/// Marker line that opens the slicer's configuration block
pub const CONFIG_BLOCK_MARKER: &str = "; prusaslicer_config = ";

/// Slicer features the rewrite tools do not model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicerFeature {
    /// Arcs emitted as `G2`/`G3` with centre offsets
    ArcFitting,
    /// Non-zero lift height on retraction
    ZHop,
    /// Wipe while retracting
    WipeWhileRetracting,
}

impl fmt::Display for SlicerFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArcFitting => write!(f, "Arc Fitting"),
            Self::ZHop => write!(f, "Lift Height (aka Z-Hop)"),
            Self::WipeWhileRetracting => write!(f, "Wipe while retracting"),
        }
    }
}

/// Settings resolved from the configuration comments of one stream
#[derive(Debug, Clone, Default)]
pub struct SlicerConfig {
    values: HashMap<String, String>,
}

impl SlicerConfig {
    /// Collect `; key = value` comments, scanning backward from the end
    ///
    /// The scan stops at the `; prusaslicer_config = begin` marker when present.
    /// When a key appears more than once the occurrence nearest the end wins.
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut values = HashMap::new();

        for line in lines.iter().rev() {
            let line = line.as_ref();
            if let Some(value) = line.strip_prefix(CONFIG_BLOCK_MARKER) {
                if value.trim() == "begin" {
                    break;
                }
                continue;
            }
            if let Some((key, value)) = parse_config_line(line) {
                values.entry(key.to_string()).or_insert_with(|| value.to_string());
            }
        }

        debug!("Resolved {} slicer configuration values", values.len());
        Self { values }
    }

    /// Build a configuration from explicit key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Number of resolved values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing was resolved
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value of the first key present, trying `keys` in order
    ///
    /// A filament override of `nil` counts as absent.
    pub fn raw(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.values.get(*key))
            .map(|v| v.as_str())
            .find(|v| *v != "nil")
    }

    /// First element of a comma separated value
    fn first_value<'a, 'k>(&'a self, keys: &[&'k str]) -> Result<(&'k str, &'a str)> {
        for &key in keys {
            if let Some(value) = self.values.get(key).filter(|v| v.as_str() != "nil") {
                let first = value.split(',').next().unwrap_or_default().trim();
                return Ok((key, first));
            }
        }
        Err(ConfigError::MissingKey {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
        .into())
    }

    /// Numeric value
    pub fn get_f64(&self, keys: &[&str]) -> Result<f64> {
        let (key, value) = self.first_value(keys)?;
        value.parse::<f64>().map_err(|e| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Boolean value (`1`/`0`, `true`/`false`)
    pub fn get_bool(&self, keys: &[&str]) -> Result<bool> {
        let (key, value) = self.first_value(keys)?;
        match value {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: "expected 0 or 1".to_string(),
            }
            .into()),
        }
    }

    /// Speed given in mm/s, returned in mm/min
    pub fn get_speed(&self, keys: &[&str]) -> Result<f64> {
        Ok(self.get_f64(keys)? * 60.0)
    }

    /// Retraction length in mm
    pub fn retract_length(&self) -> Result<f64> {
        self.get_f64(&["filament_retract_length", "retract_length"])
    }

    /// Retraction speed in mm/min
    pub fn retract_speed(&self) -> Result<f64> {
        self.get_speed(&["filament_retract_speed", "retract_speed"])
    }

    /// Deretraction speed in mm/min
    ///
    /// A value of zero means "same as the retraction speed".
    pub fn deretract_speed(&self) -> Result<f64> {
        let speed = self.get_speed(&["filament_deretract_speed", "deretract_speed"])?;
        if speed == 0.0 {
            return self.retract_speed();
        }
        Ok(speed)
    }

    /// Travel speed in mm/min
    pub fn travel_speed(&self) -> Result<f64> {
        self.get_speed(&["travel_speed"])
    }

    /// Z travel speed in mm/min
    pub fn travel_speed_z(&self) -> Result<f64> {
        self.get_speed(&["travel_speed_z"])
    }

    /// Nozzle diameter in mm
    pub fn nozzle_diameter(&self) -> Result<f64> {
        self.get_f64(&["nozzle_diameter"])
    }

    /// Minimum travel after which the slicer retracts, in mm
    pub fn retract_before_travel(&self) -> Result<f64> {
        self.get_f64(&["filament_retract_before_travel", "retract_before_travel"])
    }

    /// Lift height on retraction (zero when not configured)
    pub fn retract_lift(&self) -> Result<f64> {
        const KEYS: [&str; 2] = ["filament_retract_lift", "retract_lift"];
        if self.raw(&KEYS).is_none() {
            return Ok(0.0);
        }
        self.get_f64(&KEYS)
    }

    /// Whether wipe while retracting is on (off when not configured)
    pub fn wipe(&self) -> Result<bool> {
        if self.raw(&["filament_wipe", "wipe"]).is_none() {
            return Ok(false);
        }
        self.get_bool(&["filament_wipe", "wipe"])
    }

    /// Whether arcs are emitted with centre offsets
    pub fn arc_fitting(&self) -> bool {
        self.raw(&["arc_fitting"]) == Some("emit_center")
    }

    /// Check whether a feature is switched on in this configuration
    pub fn uses(&self, feature: SlicerFeature) -> Result<bool> {
        match feature {
            SlicerFeature::ArcFitting => Ok(self.arc_fitting()),
            SlicerFeature::ZHop => Ok(self.retract_lift()? > 0.0),
            SlicerFeature::WipeWhileRetracting => self.wipe(),
        }
    }

    /// Fail with [`ConfigError::UnsupportedFeature`] if any feature is in use
    pub fn reject(&self, features: &[SlicerFeature]) -> Result<()> {
        for feature in features {
            if self.uses(*feature)? {
                return Err(ConfigError::UnsupportedFeature {
                    feature: feature.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Split a `; key = value` comment into its key and value
fn parse_config_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("; ")?;
    let (key, value) = rest.split_once(" =")?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lines: &[&str]) -> SlicerConfig {
        SlicerConfig::from_lines(lines)
    }

    #[test]
    fn test_last_occurrence_wins() {
        let cfg = config(&[
            "; retract_length = 0.5",
            "; prusaslicer_config = begin",
            "; retract_length = 0.8",
            "; nozzle_diameter = 0.4,0.6",
            "; prusaslicer_config = end",
        ]);
        assert_eq!(cfg.retract_length().unwrap(), 0.8);
        assert_eq!(cfg.nozzle_diameter().unwrap(), 0.4);
    }

    #[test]
    fn test_scan_stops_at_block_start() {
        let cfg = config(&[
            "; travel_speed = 200",
            "; prusaslicer_config = begin",
            "; nozzle_diameter = 0.4",
        ]);
        assert!(cfg.travel_speed().is_err());
        assert_eq!(cfg.len(), 1);
    }

    #[test]
    fn test_filament_override_first() {
        let cfg = config(&[
            "; filament_retract_length = 1.2",
            "; retract_length = 0.8",
            "; filament_deretract_speed = nil",
            "; deretract_speed = 35",
        ]);
        assert_eq!(cfg.retract_length().unwrap(), 1.2);
        assert_eq!(cfg.deretract_speed().unwrap(), 2100.0);
    }

    #[test]
    fn test_zero_deretract_speed_uses_retract_speed() {
        let cfg = config(&["; deretract_speed = 0", "; retract_speed = 40"]);
        assert_eq!(cfg.deretract_speed().unwrap(), 2400.0);
    }

    #[test]
    fn test_missing_key() {
        let cfg = config(&["; retract_length = 0.8"]);
        let err = cfg.nozzle_diameter().unwrap_err();
        assert_eq!(err.to_string(), "Missing configuration key: nozzle_diameter");
    }

    #[test]
    fn test_invalid_value() {
        let cfg = config(&["; nozzle_diameter = wide"]);
        assert!(cfg.nozzle_diameter().unwrap_err().is_config_error());
    }

    #[test]
    fn test_reject_features() {
        let cfg = config(&["; arc_fitting = emit_center", "; retract_lift = 0"]);
        let err = cfg.reject(&[SlicerFeature::ArcFitting]).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported slicer feature: Arc Fitting");
        assert!(cfg.reject(&[SlicerFeature::ZHop]).is_ok());

        let cfg = config(&["; retract_lift = 0.4", "; wipe = 0"]);
        assert!(cfg.reject(&[SlicerFeature::ZHop]).is_err());
        assert!(cfg
            .reject(&[SlicerFeature::WipeWhileRetracting, SlicerFeature::ArcFitting])
            .is_ok());

        // Absent settings count as switched off
        assert!(config(&[]).reject(&[SlicerFeature::ZHop, SlicerFeature::WipeWhileRetracting]).is_ok());
    }

    #[test]
    fn test_ignores_plain_comments() {
        let cfg = config(&["; printing object cube.stl id:0 copy 0", ";TYPE:Perimeter"]);
        assert!(cfg.is_empty());
    }
}
