//! Toolhead reordering for color layers
//!
//! Objects printed in the same layer are reordered by extrusion length,
//! shortest first, so the toolhead that prints the least goes first. The
//! toolchange in front of each object slot is retargeted to the tool of the
//! object that now occupies it, and progress lines are put back in their
//! original order so the printer's remaining-time display keeps counting down.

use std::sync::OnceLock;

use gcodepost_core::{Position, Result};
use gcodepost_engine::{PositionTracker, RegionToggle, LAYER_CHANGE};
use regex::Regex;
use tracing::debug;

use crate::pipeline::PostProcessor;
use crate::report::RewriteReport;

const START_OBJECT: &str = "; printing object";
const STOP_OBJECT: &str = "; stop printing object";
const COLOR_CHANGE_PROMPT: &str = "M600 ; ";
const PROGRESS_PREFIX: &str = "M73 P";

fn toolchange_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^T([0-9]+)$").expect("invalid regex pattern"))
}

/// Parse a `T<n>` toolchange line
pub(crate) fn parse_toolchange(line: &str) -> Option<u32> {
    toolchange_regex()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// One object block inside a layer
#[derive(Debug, Clone, PartialEq)]
struct Component {
    /// Index of the start marker
    start: usize,
    /// One past the stop marker
    end: usize,
    layer: Option<usize>,
    tool: Option<u32>,
    extrusion_length: f64,
}

/// Planar length of the extrusion moves in `lines`
fn extrusion_length(lines: &[String]) -> f64 {
    let mut tracker = PositionTracker::starting_at(Position::undefined().with_z(Some(0.0)));
    lines
        .iter()
        .filter_map(|line| tracker.observe(line))
        .filter(|step| {
            step.from.is_fully_defined()
                && step.mv.has_axis()
                && step.mv.e.is_some_and(|e| e > 0.0)
        })
        .map(|step| step.planar_length())
        .sum()
}

/// Object blocks in enabled regions, grouped by layer
fn find_components(lines: &[String]) -> Vec<Vec<Component>> {
    let mut toggle = RegionToggle::named("LITHO_REORDER", false);
    let mut groups: Vec<Vec<Component>> = Vec::new();
    let mut layer: Option<usize> = None;
    let mut tool = None;
    let mut start = None;

    for (i, line) in lines.iter().enumerate() {
        if line == LAYER_CHANGE {
            layer = Some(layer.map_or(0, |l| l + 1));
        }
        if toggle.observe(line).is_some() {
            continue;
        }
        if let Some(t) = parse_toolchange(line) {
            tool = Some(t);
            continue;
        }
        if !toggle.is_enabled() {
            continue;
        }

        if line.starts_with(STOP_OBJECT) {
            let Some(start) = start.take() else {
                continue;
            };
            let component = Component {
                start,
                end: i + 1,
                layer,
                tool,
                extrusion_length: extrusion_length(&lines[start..=i]),
            };
            match groups.last_mut() {
                Some(group) if group.last().is_some_and(|c| c.layer == layer) => {
                    group.push(component)
                }
                _ => groups.push(vec![component]),
            }
        } else if line.starts_with(START_OBJECT) {
            start = Some(i);
        }
    }
    groups
}

/// Point the last toolchange in `lines` at `tool`
fn retarget(lines: &mut [String], tool: u32) {
    let Some(i) = lines.iter().rposition(|l| parse_toolchange(l).is_some()) else {
        return;
    };
    lines[i] = format!("T{}", tool);
    if i > 0 && lines[i - 1].starts_with(COLOR_CHANGE_PROMPT) {
        lines[i - 1] = format!("M600 ; change to filament for extruder {}", tool + 1);
    }
}

/// Reorders object blocks within each layer by extrusion length
#[derive(Debug, Clone, Default)]
pub struct ToolheadReorder;

impl ToolheadReorder {
    /// Create a new reorder tool
    pub fn new() -> Self {
        Self
    }
}

impl PostProcessor for ToolheadReorder {
    fn name(&self) -> &str {
        "ToolheadReorder"
    }

    fn description(&self) -> &str {
        "Reorder objects in each layer so the shortest toolhead run prints first"
    }

    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport> {
        let mut report = RewriteReport::new(self.name());
        report.lines_before = lines.len();

        let groups = find_components(lines);
        report.layers = groups.len();

        let mut out = Vec::with_capacity(lines.len());
        let mut cursor = 0;
        for group in &groups {
            let mut sorted = group.clone();
            sorted.sort_by(|a, b| a.extrusion_length.total_cmp(&b.extrusion_length));

            for (slot, component) in group.iter().zip(&sorted) {
                let mut between = lines[cursor..slot.start].to_vec();
                if let Some(tool) = component.tool {
                    retarget(&mut between, tool);
                }
                out.extend(between);
                out.extend_from_slice(&lines[component.start..component.end]);
                cursor = slot.end;

                report.count("objects", 1);
                if slot.start != component.start {
                    report.count("objects_moved", 1);
                }
            }
        }
        out.extend_from_slice(&lines[cursor..]);

        // Progress lines go back to their original order
        let mut progress = lines.iter().filter(|l| l.starts_with(PROGRESS_PREFIX));
        for line in out.iter_mut().filter(|l| l.starts_with(PROGRESS_PREFIX)) {
            if let Some(original) = progress.next() {
                line.clone_from(original);
            }
        }

        debug!(
            "Reordered {} objects across {} layers",
            report.counter("objects_moved"),
            groups.len()
        );

        *lines = out;
        report.lines_after = lines.len();
        Ok(report)
    }
}
