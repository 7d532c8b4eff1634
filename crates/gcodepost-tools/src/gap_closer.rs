//! Gap closing after deretracted travels
//!
//! After a travel with a deretraction the first few tenths of a millimetre
//! of an extrusion tend to under-extrude. Open paths get their travel target
//! moved back along the first extrusion and that extrusion stretched to
//! cover the extra distance. Closed loops instead re-extrude the tail of
//! the loop before the first extrusion, so the seam overlaps.

use gcodepost_core::{LinearMove, MoveKind, Position, Result};
use gcodepost_engine::{
    parse_move, RegionToggle, SegmenterOptions, SlicerConfig, SlicerFeature, Splicer,
    AFTER_LAYER_CHANGE,
};
use tracing::debug;

use crate::pipeline::{flag, run_policy, PostProcessor, RewritePolicy, SegmentAction, SegmentWindow};
use crate::report::RewriteReport;

const ANNOTATION: &str = " ; GapCloser";
const SEAM_ANNOTATION: &str = " ; GapCloser (Seam)";

/// Distance under which a segment counts as a closed loop
const SEAM_TOLERANCE: f64 = 0.5;

/// User options for [`GapCloser`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapCloserOptions {
    /// How far to back up the start of an extrusion, in mm
    pub back_up_distance: f64,
}

impl Default for GapCloserOptions {
    fn default() -> Self {
        Self {
            back_up_distance: 1.0,
        }
    }
}

/// Planar piece of extrusion used to rebuild the end of a loop
#[derive(Debug, Clone, Copy)]
struct Piece {
    from: Position,
    to: Position,
    e: f64,
    length: f64,
}

/// Closes gaps at the start of extrusions following a deretraction
#[derive(Debug, Clone)]
pub struct GapCloser {
    options: GapCloserOptions,
    retract_length: f64,
    deretract_speed: f64,
    arc_fitting: bool,
}

impl GapCloser {
    /// Resolve the slicer settings the rewrite depends on
    pub fn from_config(config: &SlicerConfig, options: GapCloserOptions) -> Result<Self> {
        config.reject(&[SlicerFeature::ArcFitting, SlicerFeature::ZHop])?;
        Ok(Self {
            options,
            retract_length: config.retract_length()?,
            deretract_speed: config.deretract_speed()?,
            arc_fitting: config.arc_fitting(),
        })
    }

    /// The options in use
    pub fn options(&self) -> &GapCloserOptions {
        &self.options
    }

    /// Travel line to `target`, keeping the original travel's Z and feed rate
    fn travel_line(travel: &str, target: &Position, annotation: &str) -> String {
        let original = parse_move(travel).unwrap_or_default();
        let mv = LinearMove {
            z: original.z,
            f: original.f,
            ..LinearMove::to_planar(target)
        };
        format!("{}{}", mv.to_gcode(), annotation)
    }

    /// Moves that re-extrude the last `back_up_distance` of a loop
    ///
    /// Returns the point to travel to and the moves in print order. When the
    /// loop is shorter than the back-up distance the whole loop is re-extruded.
    fn back_up_moves(&self, pieces: &[Piece]) -> Option<(Position, Vec<LinearMove>)> {
        let mut remaining = self.options.back_up_distance;
        let mut moves = Vec::new();
        let mut travel_to = None;

        for piece in pieces.iter().rev() {
            if remaining > piece.length {
                moves.push(LinearMove::to_planar(&piece.to).with_e(piece.e));
                remaining -= piece.length;
                continue;
            }

            let waypoint = piece.to.waypoint_toward(&piece.from, remaining)?;
            moves.push(LinearMove::to_planar(&piece.to).with_e(piece.e * remaining / piece.length));
            travel_to = Some(waypoint);
            break;
        }

        let travel_to = travel_to.or_else(|| pieces.first().map(|p| p.from))?;
        moves.reverse();
        Some((travel_to, moves))
    }
}

impl RewritePolicy for GapCloser {
    fn name(&self) -> &str {
        "GapCloser"
    }

    fn description(&self) -> &str {
        "Close up small gaps at the start of extrusions after travel moves with deretractions"
    }

    fn segmenter_options(&self) -> SegmenterOptions {
        SegmenterOptions::new()
            .with_after_layer_change(AFTER_LAYER_CHANGE)
            .with_toggle(RegionToggle::named("GAP_CLOSER", true))
    }

    fn rewrite_segment(
        &mut self,
        window: &mut SegmentWindow<'_>,
        report: &mut RewriteReport,
    ) -> Result<SegmentAction> {
        let segment = window.current_mut();
        if !segment.has_deretraction(self.retract_length, self.deretract_speed) {
            return Ok(SegmentAction::Keep);
        }

        let steps = segment.steps();
        let Some((first_index, first)) = steps
            .iter()
            .find(|(_, step)| step.kind == MoveKind::Extrusion)
            .copied()
        else {
            return Ok(SegmentAction::Keep);
        };
        let distance = first.planar_length();
        let Some(e) = first.mv.e.filter(|_| distance > 0.0) else {
            return Ok(SegmentAction::Keep);
        };
        let e_rate = e / distance;

        if segment.is_closed_loop(SEAM_TOLERANCE) {
            let wipe_start = segment.wipe_span.map_or(segment.lines.len(), |w| w.start);
            let mut pieces: Vec<Piece> = steps
                .iter()
                .filter(|(i, step)| *i < wipe_start && step.kind == MoveKind::Extrusion)
                .map(|(_, step)| Piece {
                    from: step.from,
                    to: step.to,
                    e: step.mv.e.unwrap_or(0.0),
                    length: step.planar_length(),
                })
                .collect();

            // Close the loop from the last extrusion back to the start
            if let Some(gap) = segment
                .extrusion_end_point
                .planar_distance(&segment.start_point)
                .filter(|gap| *gap > 0.0)
            {
                pieces.push(Piece {
                    from: segment.extrusion_end_point,
                    to: segment.start_point,
                    e: e_rate * gap,
                    length: gap,
                });
            }

            let Some((travel_to, moves)) = self.back_up_moves(&pieces) else {
                return Ok(SegmentAction::Keep);
            };

            let travel = Self::travel_line(&segment.lines[0], &travel_to, SEAM_ANNOTATION);
            let mut splicer = Splicer::new(&mut segment.lines);
            splicer.replace(0, travel);
            splicer.insert_many_at(
                first_index,
                moves
                    .iter()
                    .map(|mv| format!("{}{}", mv.to_gcode(), SEAM_ANNOTATION)),
            );

            debug!(
                "Layer {} segment {}: seam closed with {} moves",
                window.layer(),
                window.index(),
                moves.len()
            );
            report.count("seams_closed", 1);
            return Ok(SegmentAction::Rewritten);
        }

        let Some(back_up) = first
            .from
            .project_beyond(&first.to, self.options.back_up_distance)
        else {
            return Ok(SegmentAction::Keep);
        };

        let travel = Self::travel_line(&segment.lines[0], &back_up, ANNOTATION);
        let stretched = LinearMove {
            e: Some(e_rate * (distance + self.options.back_up_distance)),
            ..first.mv
        };

        let mut splicer = Splicer::new(&mut segment.lines);
        splicer.replace(0, travel);
        splicer.replace(first_index, format!("{}{}", stretched.to_gcode(), ANNOTATION));

        report.count("gaps_closed", 1);
        Ok(SegmentAction::Rewritten)
    }

    fn settings(&self) -> Vec<(String, String)> {
        vec![
            ("arc_fitting".to_string(), flag(self.arc_fitting)),
            (
                "back_up_distance".to_string(),
                self.options.back_up_distance.to_string(),
            ),
            ("deretract_speed".to_string(), self.deretract_speed.to_string()),
            ("retract_length".to_string(), self.retract_length.to_string()),
        ]
    }
}

impl PostProcessor for GapCloser {
    fn name(&self) -> &str {
        RewritePolicy::name(self)
    }

    fn description(&self) -> &str {
        RewritePolicy::description(self)
    }

    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport> {
        run_policy(self, lines)
    }

    fn settings(&self) -> Vec<(String, String)> {
        RewritePolicy::settings(self)
    }
}
