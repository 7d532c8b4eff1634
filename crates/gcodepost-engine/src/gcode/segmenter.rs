//! Print / layer / segment decomposition
//!
//! The flat line stream is split into a [`PrintTree`]:
//!
//! ```text
//! stream
//!   |--> preamble   layers   postamble
//!                     |
//!                     |--> layer preamble   segments
//! ```
//!
//! The preamble ends at the first layer change marker. The postamble starts
//! after a chosen occurrence of the cooldown instruction, counted from the end.
//! Each layer keeps its lift/prime sequence in a layer preamble, and its print
//! region is split at every travel move: a segment starts with the travel
//! that reaches it and runs up to (excluding) the next travel.
//!
//! Position, feature type and toggle state thread from one layer to the next.
//! Flattening an unmodified tree reproduces the input exactly.

use gcodepost_core::{MoveKind, Position, Result, StructureError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::parser::parse_move;
use super::toggle::RegionToggle;
use super::tracker::{PositionTracker, Step};

/// Layer change marker
pub const LAYER_CHANGE: &str = ";LAYER_CHANGE";

/// Marker emitted once the layer change sequence has completed
pub const AFTER_LAYER_CHANGE: &str = ";AFTER_LAYER_CHANGE";

/// Prefix of feature type annotations
pub const FEATURE_TYPE_PREFIX: &str = ";TYPE:";

/// Start of a wipe sequence
pub const WIPE_START: &str = ";WIPE_START";

/// End of a wipe sequence
pub const WIPE_END: &str = ";WIPE_END";

/// Fan-off instruction used to find the end of the print
pub const COOLDOWN_PREFIX: &str = "M107";

/// Lines scanned for a deretraction at the start of a segment
const DERETRACTION_WINDOW: usize = 5;

/// Options controlling segmentation
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterOptions {
    /// Marker that starts a new layer
    pub layer_change: String,
    /// Marker that must be seen before a layer's print region may start
    pub after_layer_change: Option<String>,
    /// Prefix of the cooldown instruction
    pub cooldown_prefix: String,
    /// Which cooldown occurrence, counted from the end, closes the print (1 = last, 0 = none)
    pub cooldown_occurrence: usize,
    /// Toggle sampled at every layer and segment start (always on when `None`)
    pub toggle: Option<RegionToggle>,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            layer_change: LAYER_CHANGE.to_string(),
            after_layer_change: None,
            cooldown_prefix: COOLDOWN_PREFIX.to_string(),
            cooldown_occurrence: 1,
            toggle: None,
        }
    }
}

impl SegmenterOptions {
    /// Create options with the default markers
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an after-layer-change marker in every printing layer
    pub fn with_after_layer_change(mut self, marker: impl Into<String>) -> Self {
        self.after_layer_change = Some(marker.into());
        self
    }

    /// Choose the cooldown occurrence that closes the print
    pub fn with_cooldown_occurrence(mut self, occurrence: usize) -> Self {
        self.cooldown_occurrence = occurrence.max(1);
        self
    }

    /// Gate segments with a region toggle
    pub fn with_toggle(mut self, toggle: RegionToggle) -> Self {
        self.toggle = Some(toggle);
        self
    }
}

/// Relative indices of the wipe markers inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeSpan {
    /// Index of `;WIPE_START`
    pub start: usize,
    /// Index of `;WIPE_END`, if present
    pub end: Option<usize>,
}

/// Travel-delimited run of lines inside a layer
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Lines of the segment; the first one is the travel that reaches it
    pub lines: Vec<String>,
    /// Position after the opening travel
    pub start_point: Position,
    /// Position before the next travel
    pub end_point: Position,
    /// Target of the last extrusion move (start point if none)
    pub extrusion_end_point: Position,
    /// Feature type in effect when the segment starts
    pub start_type: Option<String>,
    /// Feature type in effect when the segment ends
    pub end_type: Option<String>,
    /// Toggle state sampled at the segment start
    pub enabled: bool,
    /// Wipe markers found in the segment
    pub wipe_span: Option<WipeSpan>,
}

impl Segment {
    /// Fold every move of the segment, starting from its start point
    ///
    /// Returns the index of each move line with its step.
    pub fn steps(&self) -> Vec<(usize, Step)> {
        let mut tracker = PositionTracker::starting_at(self.start_point);
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| tracker.observe(line).map(|step| (i, step)))
            .collect()
    }

    /// Total planar length of the extrusion moves
    pub fn extrusion_length(&self) -> f64 {
        self.steps()
            .iter()
            .filter(|(_, step)| step.kind == MoveKind::Extrusion)
            .map(|(_, step)| step.planar_length())
            .sum()
    }

    /// Check for the exact deretraction signature near the segment start
    ///
    /// One of the first lines must be an extruder-only move whose amount and
    /// feed rate equal the configured deretraction exactly.
    pub fn has_deretraction(&self, retract_length: f64, deretract_speed: f64) -> bool {
        self.lines
            .iter()
            .take(DERETRACTION_WINDOW)
            .filter_map(|line| parse_move(line))
            .any(|mv| {
                mv.is_extruder_only()
                    && mv.e == Some(retract_length)
                    && mv.f == Some(deretract_speed)
            })
    }

    /// Check if the segment ends where it started (a closed loop)
    pub fn is_closed_loop(&self, tolerance: f64) -> bool {
        self.start_point
            .planar_distance(&self.extrusion_end_point)
            .is_some_and(|d| d < tolerance)
    }

    /// Lines before the wipe sequence (all lines when there is none)
    pub fn lines_before_wipe(&self) -> &[String] {
        match self.wipe_span {
            Some(span) => &self.lines[..span.start.min(self.lines.len())],
            None => &self.lines,
        }
    }
}

/// One layer of the print
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Zero-based layer index
    pub index: usize,
    /// Lines before the first segment (layer change, lift, prime)
    pub preamble: Vec<String>,
    /// Travel-delimited segments
    pub segments: Vec<Segment>,
    /// Position when the layer starts
    pub start_point: Position,
    /// Position when the layer ends
    pub end_point: Position,
    /// Feature type in effect when the layer starts
    pub start_type: Option<String>,
    /// Feature type in effect when the layer ends
    pub end_type: Option<String>,
    /// Toggle state sampled at the layer start
    pub enabled: bool,
}

impl Layer {
    /// Number of lines in the layer
    pub fn line_count(&self) -> usize {
        self.preamble.len() + self.segments.iter().map(|s| s.lines.len()).sum::<usize>()
    }

    fn flatten_into(self, out: &mut Vec<String>) {
        out.extend(self.preamble);
        for segment in self.segments {
            out.extend(segment.lines);
        }
    }
}

/// Decomposed stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintTree {
    /// Lines before the first layer change
    pub preamble: Vec<String>,
    /// Layers of the print region
    pub layers: Vec<Layer>,
    /// Lines after the cooldown boundary
    pub postamble: Vec<String>,
}

impl PrintTree {
    /// Total number of segments
    pub fn segment_count(&self) -> usize {
        self.layers.iter().map(|l| l.segments.len()).sum()
    }

    /// Iterate over every segment in order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.layers.iter().flat_map(|l| l.segments.iter())
    }

    /// Concatenate the tree back into a line stream
    pub fn flatten(self) -> Vec<String> {
        let mut out = Vec::with_capacity(
            self.preamble.len()
                + self.postamble.len()
                + self.layers.iter().map(Layer::line_count).sum::<usize>(),
        );
        out.extend(self.preamble);
        for layer in self.layers {
            layer.flatten_into(&mut out);
        }
        out.extend(self.postamble);
        out
    }
}

/// State carried from one layer into the next
struct ScanState {
    tracker: PositionTracker,
    toggle: Option<RegionToggle>,
    feature_type: Option<String>,
}

impl ScanState {
    fn enabled(&self) -> bool {
        self.toggle.as_ref().is_none_or(RegionToggle::is_enabled)
    }

    /// Observe toggle and feature type markers
    fn observe_markers(&mut self, line: &str) {
        if let Some(toggle) = self.toggle.as_mut() {
            toggle.observe(line);
        }
        if line.starts_with(FEATURE_TYPE_PREFIX) {
            self.feature_type = Some(line.to_string());
        }
    }
}

/// In-progress segment
struct OpenSegment {
    start: usize,
    start_point: Position,
    extrusion_end_point: Position,
    start_type: Option<String>,
    enabled: bool,
    wipe_start: Option<usize>,
    wipe_end: Option<usize>,
}

impl OpenSegment {
    fn new(start: usize, state: &ScanState) -> Self {
        Self {
            start,
            start_point: state.tracker.current(),
            extrusion_end_point: state.tracker.current(),
            start_type: state.feature_type.clone(),
            enabled: state.enabled(),
            wipe_start: None,
            wipe_end: None,
        }
    }

    fn close(self, lines: &[String], end: usize, state: &ScanState) -> Segment {
        Segment {
            lines: lines[self.start..end].to_vec(),
            start_point: self.start_point,
            end_point: state.tracker.current(),
            extrusion_end_point: self.extrusion_end_point,
            start_type: self.start_type,
            end_type: state.feature_type.clone(),
            enabled: self.enabled,
            wipe_span: self.wipe_start.map(|start| WipeSpan {
                start,
                end: self.wipe_end,
            }),
        }
    }
}

/// Splits a line stream into a [`PrintTree`]
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    options: SegmenterOptions,
}

impl Segmenter {
    /// Create a segmenter
    pub fn new(options: SegmenterOptions) -> Self {
        Self { options }
    }

    /// The options in use
    pub fn options(&self) -> &SegmenterOptions {
        &self.options
    }

    /// Decompose a stream
    ///
    /// Fails only when an after-layer-change marker is required and a layer
    /// with extrusion moves does not contain it.
    pub fn segment(&self, lines: Vec<String>) -> Result<PrintTree> {
        let mut state = ScanState {
            tracker: PositionTracker::new(),
            toggle: self.options.toggle.clone(),
            feature_type: None,
        };

        let Some(pre_end) = lines.iter().position(|l| *l == self.options.layer_change) else {
            warn!(
                "No '{}' marker found; the whole stream is treated as preamble",
                self.options.layer_change
            );
            return Ok(PrintTree {
                preamble: lines,
                layers: Vec::new(),
                postamble: Vec::new(),
            });
        };

        for line in &lines[..pre_end] {
            state.observe_markers(line);
            state.tracker.observe(line);
        }

        let post_start = self.find_post_start(&lines, pre_end);
        debug!(
            "Print region spans lines {}..{} of {}",
            pre_end,
            post_start,
            lines.len()
        );

        let mut boundaries: Vec<usize> = (pre_end..post_start)
            .filter(|&i| lines[i] == self.options.layer_change)
            .collect();
        boundaries.push(post_start);

        let mut layers = Vec::with_capacity(boundaries.len());
        for (index, range) in boundaries.windows(2).enumerate() {
            let layer = self.build_layer(index, &lines[range[0]..range[1]], &mut state)?;
            layers.push(layer);
        }
        debug!("Segmented {} layers", layers.len());

        let mut lines = lines;
        let postamble = lines.split_off(post_start);
        lines.truncate(pre_end);

        Ok(PrintTree {
            preamble: lines,
            layers,
            postamble,
        })
    }

    /// Index of the first postamble line
    fn find_post_start(&self, lines: &[String], pre_end: usize) -> usize {
        // Occurrence 0 names no instruction
        let found = self.options.cooldown_occurrence.checked_sub(1).and_then(|n| {
            lines
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, l)| l.starts_with(&self.options.cooldown_prefix))
                .nth(n)
                .map(|(i, _)| i + 1)
        });

        match found {
            Some(start) if start > pre_end => start,
            _ => {
                warn!(
                    "Cooldown instruction '{}' (occurrence {}) not found after the first layer; \
                     the postamble is empty",
                    self.options.cooldown_prefix, self.options.cooldown_occurrence
                );
                lines.len()
            }
        }
    }

    fn build_layer(&self, index: usize, lines: &[String], state: &mut ScanState) -> Result<Layer> {
        let start_point = state.tracker.current();
        let start_type = state.feature_type.clone();
        let enabled = state.enabled();

        // Layer preamble: up to the first travel after the after-layer-change marker
        let mut seen_after = self.options.after_layer_change.is_none();
        let mut has_extrusion = false;
        let mut print_start = None;
        for (i, line) in lines.iter().enumerate() {
            state.observe_markers(line);
            if Some(line) == self.options.after_layer_change.as_ref() {
                seen_after = true;
                continue;
            }
            if let Some(mv) = parse_move(line) {
                let kind = MoveKind::classify(&state.tracker.current(), &mv);
                if seen_after && kind == MoveKind::Travel {
                    print_start = Some(i);
                    break;
                }
                has_extrusion |= kind == MoveKind::Extrusion;
                state.tracker.step(&mv);
            }
        }

        if let (false, Some(marker)) = (seen_after, self.options.after_layer_change.as_ref()) {
            if has_extrusion {
                return Err(StructureError::LayerMarkerMissing {
                    layer: index,
                    marker: marker.clone(),
                }
                .into());
            }
        }

        let Some(print_start) = print_start else {
            return Ok(Layer {
                index,
                preamble: lines.to_vec(),
                segments: Vec::new(),
                start_point,
                end_point: state.tracker.current(),
                start_type,
                end_type: state.feature_type.clone(),
                enabled,
            });
        };

        let segments = self.build_segments(lines, print_start, state);

        Ok(Layer {
            index,
            preamble: lines[..print_start].to_vec(),
            segments,
            start_point,
            end_point: state.tracker.current(),
            start_type,
            end_type: state.feature_type.clone(),
            enabled,
        })
    }

    /// Split `lines[print_start..]` at every travel move
    fn build_segments(
        &self,
        lines: &[String],
        print_start: usize,
        state: &mut ScanState,
    ) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut open = OpenSegment::new(print_start, state);

        for (i, line) in lines.iter().enumerate().skip(print_start) {
            match parse_move(line) {
                Some(mv) => {
                    let kind = MoveKind::classify(&state.tracker.current(), &mv);
                    if kind == MoveKind::Travel && i > open.start {
                        let closed = std::mem::replace(&mut open, OpenSegment::new(i, state));
                        segments.push(closed.close(lines, i, state));
                    }

                    let step = state.tracker.step(&mv);
                    if i == open.start {
                        open.start_point = step.to;
                        open.extrusion_end_point = step.to;
                    }
                    if step.kind == MoveKind::Extrusion {
                        open.extrusion_end_point = step.to;
                    }
                }
                None => {
                    state.observe_markers(line);
                    if line == WIPE_START {
                        open.wipe_start = Some(i - open.start);
                    } else if line == WIPE_END {
                        open.wipe_end = Some(i - open.start);
                    }
                }
            }
        }

        segments.push(open.close(lines, lines.len(), state));
        segments
    }
}
