//! Position tracking over a line stream

use gcodepost_core::{LinearMove, MoveKind, Position};

use super::parser::parse_move;

/// One folded move: where it started, where it ended and what it was
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    /// Position before the move
    pub from: Position,
    /// Position after the move
    pub to: Position,
    /// The parsed move
    pub mv: LinearMove,
    /// Classification relative to `from`
    pub kind: MoveKind,
}

impl Step {
    /// Planar length covered by the move (zero when undefined)
    pub fn planar_length(&self) -> f64 {
        self.from.planar_distance(&self.to).unwrap_or(0.0)
    }
}

/// Folds moves into a running position
///
/// Wraps the immutable [`Position`] value and remembers the last position
/// with a different X/Y, which is the direction source for synthesized wipes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionTracker {
    current: Position,
    previous_planar: Position,
}

impl PositionTracker {
    /// Create a tracker with every axis undefined
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker starting at a known position
    pub fn starting_at(position: Position) -> Self {
        Self {
            current: position,
            previous_planar: Position::undefined(),
        }
    }

    /// Current position
    pub fn current(&self) -> Position {
        self.current
    }

    /// Last position whose X/Y differed from the current one
    pub fn previous_planar(&self) -> Position {
        self.previous_planar
    }

    /// Fold a move into the running position
    pub fn step(&mut self, mv: &LinearMove) -> Step {
        let from = self.current;
        let to = from.apply_move(mv);
        let kind = MoveKind::classify(&from, mv);

        if !from.is_planar_equal(&to) {
            self.previous_planar = from;
        }
        self.current = to;

        Step { from, to, mv: *mv, kind }
    }

    /// Parse a line and fold it if it is a move
    pub fn observe(&mut self, line: &str) -> Option<Step> {
        let mv = parse_move(line)?;
        Some(self.step(&mv))
    }

    /// Forget everything (all axes back to undefined)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Count the pure retractions (extruder-only moves with negative E) in a stream
pub fn count_retractions<S: AsRef<str>>(lines: &[S]) -> usize {
    lines
        .iter()
        .filter_map(|line| parse_move(line.as_ref()))
        .filter(|mv| mv.is_extruder_only() && mv.e.is_some_and(|e| e < 0.0))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_folds_moves() {
        let mut tracker = PositionTracker::new();
        assert!(tracker.observe("; comment").is_none());

        tracker.observe("G1 Z.2 F7800");
        let step = tracker.observe("G1 X10 Y5 F9000").unwrap();
        assert_eq!(step.kind, MoveKind::Travel);
        assert_eq!(tracker.current(), Position::new(10.0, 5.0, 0.2));

        let step = tracker.observe("G1 X20 Y5 E.5").unwrap();
        assert_eq!(step.kind, MoveKind::Extrusion);
        assert!((step.planar_length() - 10.0).abs() < 1e-9);
        assert_eq!(tracker.previous_planar(), Position::new(10.0, 5.0, 0.2));
    }

    #[test]
    fn test_previous_planar_ignores_in_place_moves() {
        let mut tracker = PositionTracker::starting_at(Position::new(0.0, 0.0, 0.2));
        tracker.observe("G1 X5 Y0 E.2");
        tracker.observe("G1 E-.8 F2100");
        tracker.observe("G1 Z.4");
        assert_eq!(tracker.previous_planar(), Position::new(0.0, 0.0, 0.2));
    }

    #[test]
    fn test_reset() {
        let mut tracker = PositionTracker::starting_at(Position::new(1.0, 1.0, 1.0));
        tracker.reset();
        assert_eq!(tracker.current(), Position::undefined());
    }

    #[test]
    fn test_count_retractions() {
        let lines = [
            "G1 E-.8 F2100",
            "G1 X1 Y1",
            "G1 E.8 F2100",
            "G1 X2 Y2 E-.2",
            "G1 E-1",
        ];
        assert_eq!(count_retractions(&lines), 2);
    }
}
