//! Cursor-safe line splicing
//!
//! A [`Splicer`] pairs a mutable line list with a scan cursor. Every insert or
//! delete adjusts the cursor so a single forward pass can keep mutating the
//! list it is walking: lines inserted at or before the cursor are not
//! revisited, and the line under the cursor keeps its identity.

use gcodepost_core::{LinearMove, Position};

use super::parser::parse_move;

/// Mutable view over a line list with a live scan cursor
#[derive(Debug)]
pub struct Splicer<'a> {
    lines: &'a mut Vec<String>,
    cursor: usize,
}

impl<'a> Splicer<'a> {
    /// Create a splicer with the cursor on the first line
    pub fn new(lines: &'a mut Vec<String>) -> Self {
        Self { lines, cursor: 0 }
    }

    /// Create a splicer with the cursor at `cursor` (clamped to the end)
    pub fn with_cursor(lines: &'a mut Vec<String>, cursor: usize) -> Self {
        let cursor = cursor.min(lines.len());
        Self { lines, cursor }
    }

    /// Current cursor index
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if there are no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Check if the cursor ran past the last line
    pub fn is_done(&self) -> bool {
        self.cursor >= self.lines.len()
    }

    /// Line under the cursor
    pub fn current(&self) -> Option<&str> {
        self.get(self.cursor)
    }

    /// Line at an index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// All lines
    pub fn lines(&self) -> &[String] {
        self.lines
    }

    /// Move the cursor one line forward
    pub fn advance(&mut self) {
        if self.cursor < self.lines.len() {
            self.cursor += 1;
        }
    }

    /// Put the cursor on an index (clamped to the end)
    pub fn seek(&mut self, index: usize) {
        self.cursor = index.min(self.lines.len());
    }

    /// Insert one line; returns the index it landed on
    pub fn insert_at(&mut self, offset: usize, line: impl Into<String>) -> usize {
        let offset = offset.min(self.lines.len());
        self.lines.insert(offset, line.into());
        if offset <= self.cursor {
            self.cursor += 1;
        }
        offset
    }

    /// Insert several lines in order; returns how many were inserted
    pub fn insert_many_at<I, S>(&mut self, offset: usize, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let offset = offset.min(self.lines.len());
        let before = self.lines.len();
        self.lines
            .splice(offset..offset, lines.into_iter().map(Into::into));
        let inserted = self.lines.len() - before;
        if offset <= self.cursor {
            self.cursor += inserted;
        }
        inserted
    }

    /// Remove lines `[start, end)` and return them
    ///
    /// A cursor inside the removed range moves to `start`.
    pub fn delete_range(&mut self, start: usize, end: usize) -> Vec<String> {
        let end = end.min(self.lines.len());
        let start = start.min(end);
        let removed: Vec<String> = self.lines.drain(start..end).collect();

        if self.cursor >= end {
            self.cursor -= removed.len();
        } else if self.cursor > start {
            self.cursor = start;
        }
        removed
    }

    /// Replace the line at `index`; returns the old line
    pub fn replace(&mut self, index: usize, line: impl Into<String>) -> Option<String> {
        let slot = self.lines.get_mut(index)?;
        Some(std::mem::replace(slot, line.into()))
    }

    /// Split the move at `index` at `distance` along its planar path
    ///
    /// `start` is the position before the move. The move is replaced by the
    /// head and tail of the split. Returns `None` (and changes nothing) when
    /// the line is not an extruding move or `distance` is not strictly inside it.
    pub fn split_move_at(
        &mut self,
        index: usize,
        start: &Position,
        distance: f64,
    ) -> Option<MoveSplit> {
        let mv = parse_move(self.get(index)?)?;
        let split = MoveSplit::compute(start, &mv, distance)?;

        self.replace(index, split.head.to_gcode());
        self.insert_at(index + 1, split.tail.to_gcode());
        Some(split)
    }
}

/// Proportional split of an extruding move at a waypoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveSplit {
    /// Point where the move is split
    pub waypoint: Position,
    /// Original target of the move
    pub target: Position,
    /// Fraction of the planar length covered by the head
    pub proportion: f64,
    /// Move from the start to the waypoint
    pub head: LinearMove,
    /// Move from the waypoint to the original target
    pub tail: LinearMove,
}

impl MoveSplit {
    /// Compute the split of `mv` executed from `start`
    ///
    /// Extrusion is interpolated linearly by planar distance. The head keeps
    /// the move's Z and feed rate. Returns `None` when the move has no
    /// extrusion, no planar length, or `distance` is outside `(0, length)`.
    pub fn compute(start: &Position, mv: &LinearMove, distance: f64) -> Option<Self> {
        let e = mv.e?;
        let target = start.apply_move(mv);
        let length = start.planar_distance(&target)?;
        if length <= 0.0 || distance <= 0.0 || distance >= length {
            return None;
        }

        let waypoint = start.waypoint_toward(&target, distance)?;
        let proportion = distance / length;

        let head = LinearMove {
            x: waypoint.x,
            y: waypoint.y,
            z: mv.z,
            e: Some(e * proportion),
            f: mv.f,
        };
        let tail = LinearMove {
            x: target.x,
            y: target.y,
            z: None,
            e: Some(e * (1.0 - proportion)),
            f: None,
        };

        Some(Self {
            waypoint,
            target,
            proportion,
            head,
            tail,
        })
    }
}
