//! Sentinel-driven on/off regions

use serde::{Deserialize, Serialize};

/// On/off state driven by a pair of exact-match marker lines
///
/// Seeing the enable marker switches the state on, the disable marker
/// switches it off, any other line leaves it unchanged. Instances are
/// independent; several toggles can scan the same stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionToggle {
    enable_marker: String,
    disable_marker: String,
    default_state: bool,
    state: bool,
}

impl RegionToggle {
    /// Create a toggle in its default state
    pub fn new(
        enable_marker: impl Into<String>,
        disable_marker: impl Into<String>,
        default_state: bool,
    ) -> Self {
        Self {
            enable_marker: enable_marker.into(),
            disable_marker: disable_marker.into(),
            default_state,
            state: default_state,
        }
    }

    /// Create the conventional `; <NAME>_ENABLED` / `; <NAME>_DISABLED` pair
    pub fn named(name: &str, default_state: bool) -> Self {
        Self::new(
            format!("; {}_ENABLED", name),
            format!("; {}_DISABLED", name),
            default_state,
        )
    }

    /// Current state
    pub fn is_enabled(&self) -> bool {
        self.state
    }

    /// The enable marker
    pub fn enable_marker(&self) -> &str {
        &self.enable_marker
    }

    /// The disable marker
    pub fn disable_marker(&self) -> &str {
        &self.disable_marker
    }

    /// Check if a line is one of the two markers
    pub fn is_marker(&self, line: &str) -> bool {
        line == self.enable_marker || line == self.disable_marker
    }

    /// Feed one line; returns the new state when the line was a marker
    pub fn observe(&mut self, line: &str) -> Option<bool> {
        if line == self.enable_marker {
            self.state = true;
        } else if line == self.disable_marker {
            self.state = false;
        } else {
            return None;
        }
        Some(self.state)
    }

    /// Return to the default state
    pub fn reset(&mut self) {
        self.state = self.default_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_switch_state() {
        let mut toggle = RegionToggle::named("GAP_CLOSER", true);
        assert!(toggle.is_enabled());

        assert_eq!(toggle.observe("G1 X1 Y1"), None);
        assert_eq!(toggle.observe("; GAP_CLOSER_DISABLED"), Some(false));
        assert!(!toggle.is_enabled());
        assert_eq!(toggle.observe("; GAP_CLOSER_DISABLED"), Some(false));
        assert_eq!(toggle.observe("; GAP_CLOSER_ENABLED"), Some(true));

        toggle.observe("; GAP_CLOSER_DISABLED");
        toggle.reset();
        assert!(toggle.is_enabled());
    }

    #[test]
    fn test_toggles_are_independent() {
        let mut a = RegionToggle::named("A", false);
        let mut b = RegionToggle::named("B", false);
        for line in ["; A_ENABLED", "G1 X1", "; B_ENABLED", "; A_DISABLED"] {
            a.observe(line);
            b.observe(line);
        }
        assert!(!a.is_enabled());
        assert!(b.is_enabled());
    }

    #[test]
    fn test_exact_match_only() {
        let mut toggle = RegionToggle::named("BLIP_REMOVER", false);
        assert_eq!(toggle.observe("; BLIP_REMOVER_ENABLED "), None);
        assert_eq!(toggle.observe(";BLIP_REMOVER_ENABLED"), None);
        assert!(!toggle.is_enabled());
    }
}
