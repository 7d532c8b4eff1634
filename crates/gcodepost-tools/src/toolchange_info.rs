//! Toolchange timing report
//!
//! Read-only: lists every `T<n>` toolchange with the extruder it selects,
//! its color, the remaining print time when it happens and how long the
//! tool stays loaded. Times come from the slicer's `M73 P.. R..` progress
//! lines.

use std::fmt;
use std::sync::OnceLock;

use gcodepost_engine::SlicerConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::toolhead_reorder::parse_toolchange;

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^M73 P(\d+) R(\d+)").expect("invalid regex pattern"))
}

/// Remaining minutes of an `M73 P.. R..` progress line
fn remaining_minutes(line: &str) -> Option<u32> {
    progress_regex()
        .captures(line)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Format a duration in minutes as `2 hrs 5 mins`
pub fn format_minutes(total: u32) -> String {
    let (hours, minutes) = (total / 60, total % 60);
    let plural = |n: u32| if n > 1 { "s" } else { "" };

    let text = format!("{} min{}", minutes, plural(minutes));
    if hours > 0 {
        format!("{} hr{} {}", hours, plural(hours), text)
    } else {
        text
    }
}

/// One toolchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchangeEntry {
    /// Toolchange number (`None` for the initial tool selection)
    pub number: Option<usize>,
    /// One-based extruder number
    pub extruder: u32,
    /// Configured extruder color
    pub colour: Option<String>,
    /// Remaining print time when the change happens, in minutes
    pub remaining_minutes: Option<u32>,
    /// Time until the next toolchange (or the end), in minutes
    pub duration_minutes: Option<u32>,
}

/// Toolchange listing for a whole print
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchangeInfo {
    /// Total print time in minutes
    pub total_minutes: Option<u32>,
    /// Toolchanges in print order
    pub toolchanges: Vec<ToolchangeEntry>,
}

impl ToolchangeInfo {
    /// Collect toolchanges from a stream
    pub fn from_lines(lines: &[String]) -> Self {
        let total_minutes = lines.iter().find_map(|l| remaining_minutes(l));

        let colours: Vec<String> = SlicerConfig::from_lines(lines)
            .raw(&["extruder_colour"])
            .map(|value| {
                value
                    .split(';')
                    .map(|c| c.trim().trim_matches('"').to_string())
                    .collect()
            })
            .unwrap_or_default();

        // (remaining at change, tool)
        let mut changes: Vec<(Option<u32>, u32)> = Vec::new();
        let mut last_progress = None;
        for line in lines {
            if let Some(minutes) = remaining_minutes(line) {
                last_progress = Some(minutes);
            } else if let Some(tool) = parse_toolchange(line) {
                changes.push((last_progress, tool));
            }
        }

        let toolchanges = changes
            .iter()
            .enumerate()
            .map(|(i, &(at, tool))| {
                let remaining = if i == 0 { total_minutes } else { at };
                let next = match changes.get(i + 1) {
                    Some((next, _)) => *next,
                    None => Some(0),
                };
                ToolchangeEntry {
                    number: (i > 0).then_some(i),
                    extruder: tool + 1,
                    colour: colours.get(tool as usize).filter(|c| !c.is_empty()).cloned(),
                    remaining_minutes: remaining,
                    duration_minutes: remaining
                        .zip(next)
                        .map(|(remaining, next)| remaining.saturating_sub(next)),
                }
            })
            .collect();

        Self {
            total_minutes,
            toolchanges,
        }
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ToolchangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = |m: Option<u32>| m.map_or_else(|| "-".to_string(), format_minutes);

        writeln!(f, "Total Print Time: {}", minutes(self.total_minutes))?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<13} {:<11} {:<10} {:<25} {}",
            "Toolchange #", "Extruder #", "Color", "Time Remaining at Change", "Duration"
        )?;
        for entry in &self.toolchanges {
            writeln!(
                f,
                "{:<13} {:<11} {:<10} {:<25} {}",
                entry
                    .number
                    .map_or_else(|| "-".to_string(), |n| n.to_string()),
                entry.extruder,
                entry.colour.as_deref().unwrap_or("-"),
                minutes(entry.remaining_minutes),
                minutes(entry.duration_minutes),
            )?;
        }
        Ok(())
    }
}
