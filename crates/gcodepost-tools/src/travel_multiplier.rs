//! Travel extrusion multiplier
//!
//! Scales the extrusion of the first millimetre(s) printed after a travel
//! with a deretraction. The move that crosses the distance boundary is
//! split so only its head is scaled.

use gcodepost_core::{LinearMove, MoveKind, Result};
use gcodepost_engine::{RegionToggle, SegmenterOptions, SlicerConfig, SlicerFeature, Splicer};

use crate::pipeline::{flag, run_policy, PostProcessor, RewritePolicy, SegmentAction, SegmentWindow};
use crate::report::RewriteReport;

/// User options for [`TravelMultiplier`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelMultiplierOptions {
    /// Multiplier applied to the extrusion after a travel
    pub multiplier: f64,
    /// Extrusion distance the multiplier applies to, in mm
    pub distance: f64,
}

impl Default for TravelMultiplierOptions {
    fn default() -> Self {
        Self {
            multiplier: 1.1,
            distance: 1.0,
        }
    }
}

/// Applies an extrusion multiplier right after deretracted travels
#[derive(Debug, Clone)]
pub struct TravelMultiplier {
    options: TravelMultiplierOptions,
    retract_length: f64,
    deretract_speed: f64,
    arc_fitting: bool,
}

impl TravelMultiplier {
    /// Resolve the slicer settings the rewrite depends on
    pub fn from_config(config: &SlicerConfig, options: TravelMultiplierOptions) -> Result<Self> {
        config.reject(&[
            SlicerFeature::ArcFitting,
            SlicerFeature::ZHop,
            SlicerFeature::WipeWhileRetracting,
        ])?;
        Ok(Self {
            options,
            retract_length: config.retract_length()?,
            deretract_speed: config.deretract_speed()?,
            arc_fitting: config.arc_fitting(),
        })
    }

    /// The options in use
    pub fn options(&self) -> &TravelMultiplierOptions {
        &self.options
    }

    fn annotate_scaled(&self, mv: &LinearMove) -> String {
        format!(
            "{} ; TEM Updated ({}x)",
            mv.to_gcode(),
            self.options.multiplier
        )
    }
}

impl RewritePolicy for TravelMultiplier {
    fn name(&self) -> &str {
        "TravelExtrusionMultiplier"
    }

    fn description(&self) -> &str {
        "Apply an extrusion multiplier to a short distance of extrusion after a travel move"
    }

    fn segmenter_options(&self) -> SegmenterOptions {
        SegmenterOptions::new().with_toggle(RegionToggle::named("TRAVEL_EXTRUSION_MULT", true))
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

        let m = self.options.multiplier;
        let mut remaining = self.options.distance;
        let mut scaled = 0;

        let steps = segment.steps();
        let mut splicer = Splicer::new(&mut segment.lines);
        for (index, step) in steps {
            if remaining <= 0.0 {
                break;
            }
            if step.kind != MoveKind::Extrusion {
                continue;
            }

            let length = step.planar_length();
            if remaining >= length {
                let e = step.mv.e.unwrap_or(0.0);
                let mv = LinearMove {
                    x: step.to.x,
                    y: step.to.y,
                    e: Some(e * m),
                    ..step.mv
                };
                splicer.replace(index, self.annotate_scaled(&mv));
                scaled += 1;
            } else if let Some(split) = splicer.split_move_at(index, &step.from, remaining) {
                // Last edit of the segment: no later index is shifted by the tail
                let head = LinearMove {
                    e: split.head.e.map(|e| e * m),
                    ..split.head
                };
                splicer.replace(index, self.annotate_scaled(&head));
                splicer.replace(index + 1, format!("{} ; TEM Updated", split.tail.to_gcode()));
                scaled += 1;
            }
            remaining -= length;
        }

        if scaled == 0 {
            return Ok(SegmentAction::Keep);
        }

        report.count("moves_scaled", scaled);
        Ok(SegmentAction::Rewritten)
    }

    fn settings(&self) -> Vec<(String, String)> {
        vec![
            ("arc_fitting".to_string(), flag(self.arc_fitting)),
            ("deretract_speed".to_string(), self.deretract_speed.to_string()),
            ("retract_length".to_string(), self.retract_length.to_string()),
            (
                "travel_extrusion_multiplier".to_string(),
                self.options.multiplier.to_string(),
            ),
            (
                "travel_multiplier_distance".to_string(),
                self.options.distance.to_string(),
            ),
        ]
    }
}

impl PostProcessor for TravelMultiplier {
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
