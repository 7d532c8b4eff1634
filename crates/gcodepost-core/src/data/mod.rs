//! Data models for moves and positions
//!
//! The two value types every rewrite is built from:
//! - [`LinearMove`] - a parsed `G1` line with up to five optional fields
//! - [`Position`] - a three-axis point where each axis may still be unknown
//!
//! Both are immutable `Copy` values. Position updates are non-destructive:
//! [`Position::apply_move`] returns a new position and leaves the old one intact.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::units::{format_extrusion, format_feed_rate, format_position};

/// A single linear move (`G1`)
///
/// Each field is an `Option` where `None` means "unchanged by this move".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearMove {
    /// Absolute X target
    pub x: Option<f64>,
    /// Absolute Y target
    pub y: Option<f64>,
    /// Absolute Z target
    pub z: Option<f64>,
    /// Extrusion amount (negative retracts filament)
    pub e: Option<f64>,
    /// Feed rate in mm/min
    pub f: Option<f64>,
}

impl LinearMove {
    /// Create an empty move (all fields None)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the X target
    pub fn with_x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    /// Set the Y target
    pub fn with_y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    /// Set the Z target
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    /// Set the extrusion amount
    pub fn with_e(mut self, e: f64) -> Self {
        self.e = Some(e);
        self
    }

    /// Set the feed rate
    pub fn with_f(mut self, f: f64) -> Self {
        self.f = Some(f);
        self
    }

    /// Move towards the planar coordinates of a position
    pub fn to_planar(position: &Position) -> Self {
        Self {
            x: position.x,
            y: position.y,
            ..Self::default()
        }
    }

    /// Check if any of X, Y or Z is given
    pub fn has_axis(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.z.is_some()
    }

    /// Check if the move only drives the extruder (no X/Y/Z field at all)
    pub fn is_extruder_only(&self) -> bool {
        !self.has_axis() && self.e.is_some()
    }

    /// Render the move as a G-code line
    ///
    /// Fields are written in X Y Z E F order with the fixed output precision.
    pub fn to_gcode(&self) -> String {
        let mut line = String::from("G1");
        if let Some(x) = self.x {
            line.push_str(&format!(" X{}", format_position(x)));
        }
        if let Some(y) = self.y {
            line.push_str(&format!(" Y{}", format_position(y)));
        }
        if let Some(z) = self.z {
            line.push_str(&format!(" Z{}", format_position(z)));
        }
        if let Some(e) = self.e {
            line.push_str(&format!(" E{}", format_extrusion(e)));
        }
        if let Some(f) = self.f {
            line.push_str(&format!(" F{}", format_feed_rate(f)));
        }
        line
    }
}

impl fmt::Display for LinearMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_gcode())
    }
}

/// Tool position in 3D space where each axis may be undefined
///
/// Before the first move that names an axis, that axis is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate
    pub x: Option<f64>,
    /// Y coordinate
    pub y: Option<f64>,
    /// Z coordinate
    pub z: Option<f64>,
}

impl Position {
    /// Position with all three axes unknown
    pub const fn undefined() -> Self {
        Self {
            x: None,
            y: None,
            z: None,
        }
    }

    /// Create a fully defined position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Create a position with only X and Y defined
    pub fn planar(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
        }
    }

    /// Check if all three axes are defined
    pub fn is_fully_defined(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.z.is_some()
    }

    /// Check if X and Y are defined
    pub fn is_planar_defined(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }

    /// Return a copy with the Z axis replaced
    pub fn with_z(mut self, z: Option<f64>) -> Self {
        self.z = z;
        self
    }

    /// Apply a move, replacing only the axes the move specifies
    pub fn apply_move(&self, mv: &LinearMove) -> Position {
        Position {
            x: mv.x.or(self.x),
            y: mv.y.or(self.y),
            z: mv.z.or(self.z),
        }
    }

    /// Exact X/Y equality (two undefined axes compare equal)
    pub fn is_planar_equal(&self, other: &Position) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// Euclidean distance over X/Y
    ///
    /// Returns `None` unless X and Y are defined on both positions.
    pub fn planar_distance(&self, other: &Position) -> Option<f64> {
        let (x1, y1) = (self.x?, self.y?);
        let (x2, y2) = (other.x?, other.y?);
        Some(((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt())
    }

    /// Point `distance` along the segment from self to `target`
    ///
    /// Clamped to `target` when `distance` reaches or exceeds the segment length.
    pub fn waypoint_toward(&self, target: &Position, distance: f64) -> Option<Position> {
        let length = self.planar_distance(target)?;
        if distance >= length {
            return Some(*target);
        }

        let (x, y) = (self.x?, self.y?);
        let p = distance / length;
        Some(Position {
            x: Some(x + (target.x? - x) * p),
            y: Some(y + (target.y? - y) * p),
            z: self.z,
        })
    }

    /// Extrapolate `distance` past self, continuing the direction from `from`
    ///
    /// Keeps self's Z. Returns `None` when the direction is undefined.
    pub fn project_beyond(&self, from: &Position, distance: f64) -> Option<Position> {
        let length = from.planar_distance(self)?;
        if length == 0.0 {
            return None;
        }

        let (x, y) = (self.x?, self.y?);
        let p = distance / length;
        Some(Position {
            x: Some(x + (x - from.x?) * p),
            y: Some(y + (y - from.y?) * p),
            z: self.z,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axis = |v: Option<f64>| v.map_or_else(|| "?".to_string(), |v| format!("{:.3}", v));
        write!(f, "X:{} Y:{} Z:{}", axis(self.x), axis(self.y), axis(self.z))
    }
}

/// Classification of a linear move relative to the current position
///
/// Every parsed move falls in exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    /// No extrusion field and a changed X/Y position
    Travel,
    /// Positive extrusion and a changed X/Y position
    Extrusion,
    /// Extrusion field with an unchanged X/Y position
    ///
    /// A negative amount retracts, a positive amount deretracts.
    Retraction,
    /// Anything else (Z-only or feed-only moves, retract-while-moving)
    Other,
}

impl MoveKind {
    /// Classify `mv` as executed from `from`
    pub fn classify(from: &Position, mv: &LinearMove) -> Self {
        let to = from.apply_move(mv);
        let planar_changed = !from.is_planar_equal(&to);

        match (mv.e, planar_changed) {
            (None, true) => MoveKind::Travel,
            (Some(e), true) if e > 0.0 => MoveKind::Extrusion,
            (Some(_), false) => MoveKind::Retraction,
            _ => MoveKind::Other,
        }
    }

    /// Check if this is a travel move
    pub fn is_travel(&self) -> bool {
        matches!(self, MoveKind::Travel)
    }

    /// Check if this is an extrusion move
    pub fn is_extrusion(&self) -> bool {
        matches!(self, MoveKind::Extrusion)
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Travel => write!(f, "travel"),
            Self::Extrusion => write!(f, "extrusion"),
            Self::Retraction => write!(f, "retraction"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_move_is_non_destructive() {
        let start = Position::new(1.0, 2.0, 0.2);
        let moved = start.apply_move(&LinearMove::new().with_x(5.0));
        assert_eq!(start, Position::new(1.0, 2.0, 0.2));
        assert_eq!(moved, Position::new(5.0, 2.0, 0.2));
    }

    #[test]
    fn test_undefined_axes_fill_in() {
        let p = Position::undefined()
            .apply_move(&LinearMove::new().with_z(0.2))
            .apply_move(&LinearMove::new().with_x(1.0).with_y(1.0));
        assert!(p.is_fully_defined());
        assert_eq!(Position::undefined().planar_distance(&p), None);
    }

    #[test]
    fn test_waypoint_clamps_to_target() {
        let a = Position::new(0.0, 0.0, 0.2);
        let b = Position::new(10.0, 0.0, 0.2);
        assert_eq!(a.waypoint_toward(&b, 4.0), Some(Position::new(4.0, 0.0, 0.2)));
        assert_eq!(a.waypoint_toward(&b, 12.0), Some(b));
    }

    #[test]
    fn test_project_beyond() {
        let from = Position::new(0.0, 0.0, 0.2);
        let at = Position::new(3.0, 4.0, 0.4);
        let beyond = at.project_beyond(&from, 5.0).unwrap();
        assert!((beyond.x.unwrap() - 6.0).abs() < 1e-9);
        assert!((beyond.y.unwrap() - 8.0).abs() < 1e-9);
        assert_eq!(beyond.z, Some(0.4));

        assert_eq!(at.project_beyond(&at, 1.0), None);
    }

    #[test]
    fn test_classify() {
        let at = Position::new(10.0, 0.0, 0.2);
        let travel = LinearMove::new().with_x(20.0).with_f(9000.0);
        let extrude = LinearMove::new().with_x(20.0).with_e(0.5);
        let retract = LinearMove::new().with_x(10.0).with_y(0.0).with_e(-1.0).with_f(2000.0);
        let lift = LinearMove::new().with_z(0.6);

        assert_eq!(MoveKind::classify(&at, &travel), MoveKind::Travel);
        assert_eq!(MoveKind::classify(&at, &extrude), MoveKind::Extrusion);
        assert_eq!(MoveKind::classify(&at, &retract), MoveKind::Retraction);
        assert_eq!(MoveKind::classify(&at, &lift), MoveKind::Other);
    }

    #[test]
    fn test_to_gcode() {
        let mv = LinearMove::new().with_x(4.0).with_y(0.0).with_e(0.8);
        assert_eq!(mv.to_gcode(), "G1 X4. Y0.000 E.8");

        let mv = LinearMove::new().with_e(-0.8).with_f(2100.0);
        assert_eq!(mv.to_string(), "G1 E-0.8 F2100");
    }
}
