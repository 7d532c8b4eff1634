//! Rewrite reports
//!
//! Every run returns a [`RewriteReport`] instead of bumping shared counters.
//! The caller prints it or serializes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Summary of one post-processing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteReport {
    /// Tool that produced the report
    pub tool: String,
    /// Layers found in the stream
    pub layers: usize,
    /// Segments found in the stream
    pub segments: usize,
    /// Segments rewritten in place
    pub segments_modified: usize,
    /// Segments removed
    pub segments_removed: usize,
    /// Line count before processing
    pub lines_before: usize,
    /// Line count after processing
    pub lines_after: usize,
    /// Tool specific counters
    pub counters: BTreeMap<String, usize>,
}

impl RewriteReport {
    /// Create an empty report for a tool
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            ..Self::default()
        }
    }

    /// Add `n` to a named counter
    pub fn count(&mut self, counter: &str, n: usize) {
        *self.counters.entry(counter.to_string()).or_insert(0) += n;
    }

    /// Set a named counter
    pub fn set(&mut self, counter: &str, value: usize) {
        self.counters.insert(counter.to_string(), value);
    }

    /// Value of a named counter (zero when never counted)
    pub fn counter(&self, counter: &str) -> usize {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    /// Lines inserted minus lines deleted
    pub fn line_delta(&self) -> i64 {
        self.lines_after as i64 - self.lines_before as i64
    }

    /// Check if the run changed anything
    pub fn has_changes(&self) -> bool {
        self.segments_modified > 0
            || self.segments_removed > 0
            || self.lines_before != self.lines_after
            || self.counters.values().any(|v| *v > 0)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for RewriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.tool)?;
        if self.segments > 0 {
            writeln!(
                f,
                "  {} layers, {} segments ({} modified, {} removed)",
                self.layers, self.segments, self.segments_modified, self.segments_removed
            )?;
        }
        writeln!(
            f,
            "  {} lines -> {} lines ({:+})",
            self.lines_before,
            self.lines_after,
            self.line_delta()
        )?;
        for (name, value) in &self.counters {
            writeln!(f, "  {}: {}", name.replace('_', " "), value)?;
        }
        Ok(())
    }
}
