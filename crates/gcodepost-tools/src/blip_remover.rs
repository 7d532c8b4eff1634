//! Blip removal
//!
//! Extrusion segments shorter than the nozzle diameter print as blips on
//! lithophane-style color layers. They are removed, and the retractions
//! around the gap they leave are rebalanced: a long travel that lost its
//! retraction gets one, a short hop that kept one has the pair removed.

use gcodepost_core::{format_feed_rate, format_position, LinearMove, MoveKind, Result};
use gcodepost_engine::{
    count_retractions, RegionToggle, Segment, SegmenterOptions, SlicerConfig, SlicerFeature,
    Splicer, FEATURE_TYPE_PREFIX,
};
use tracing::debug;

use crate::pipeline::{run_policy, PostProcessor, RewritePolicy, SegmentAction, SegmentWindow};
use crate::report::RewriteReport;

const RETRACTION_START: &str = "; BLIP_REMOVER RETRACTION START";
const RETRACTION_END: &str = "; BLIP_REMOVER RETRACTION END";
const REMOVE_RETRACTION_START: &str = "; BLIP_REMOVER REMOVE RETRACTION START";
const REMOVE_RETRACTION_END: &str = "; BLIP_REMOVER REMOVE RETRACTION END";

/// User options for [`BlipRemover`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlipRemoverOptions {
    /// Travel distance above which a retraction is required
    ///
    /// Defaults to the slicer's minimum travel after retraction.
    pub wipe_threshold: Option<f64>,
}

/// Removes extrusion segments shorter than the nozzle diameter
#[derive(Debug, Clone)]
pub struct BlipRemover {
    nozzle_diameter: f64,
    retract_length: f64,
    retract_speed: f64,
    wipe_threshold: f64,
}

impl BlipRemover {
    /// Resolve the slicer settings the rewrite depends on
    pub fn from_config(config: &SlicerConfig, options: BlipRemoverOptions) -> Result<Self> {
        config.reject(&[
            SlicerFeature::ArcFitting,
            SlicerFeature::ZHop,
            SlicerFeature::WipeWhileRetracting,
        ])?;

        let wipe_threshold = match options.wipe_threshold {
            Some(threshold) => threshold,
            None => config.retract_before_travel()?,
        };

        Ok(Self {
            nozzle_diameter: config.nozzle_diameter()?,
            retract_length: config.retract_length()?,
            retract_speed: config.retract_speed()?,
            wipe_threshold,
        })
    }

    /// Travel distance above which a retraction is required
    pub fn wipe_threshold(&self) -> f64 {
        self.wipe_threshold
    }

    fn retraction_line(&self, sign: &str) -> String {
        format!(
            "G1 E{}{} F{}",
            sign,
            format_position(self.retract_length),
            format_feed_rate(self.retract_speed)
        )
    }

    /// Lines left behind by a removed segment
    ///
    /// Unbalanced retractions are kept as extruder-only moves so the
    /// filament state stays correct, and the last feature type annotation is
    /// kept so the next segment is labelled correctly.
    fn remnants(segment: &Segment) -> Vec<String> {
        let retractions: Vec<LinearMove> = segment
            .steps()
            .into_iter()
            .filter(|(_, step)| step.kind == MoveKind::Retraction)
            .map(|(_, step)| LinearMove {
                e: step.mv.e,
                f: step.mv.f,
                ..LinearMove::default()
            })
            .collect();
        let net: f64 = retractions.iter().filter_map(|mv| mv.e).sum();

        let mut kept = Vec::new();
        if net.abs() > 1e-9 {
            kept.extend(retractions.iter().map(LinearMove::to_gcode));
        }
        if let Some(feature) = segment
            .lines
            .iter()
            .rev()
            .find(|line| line.starts_with(FEATURE_TYPE_PREFIX))
        {
            kept.push(feature.clone());
        }
        kept
    }
}

/// Index of the last retraction or deretraction move in a segment
fn last_retraction(segment: &Segment) -> Option<(usize, f64)> {
    segment
        .steps()
        .into_iter()
        .filter(|(_, step)| step.kind == MoveKind::Retraction)
        .filter_map(|(i, step)| step.mv.e.map(|e| (i, e)))
        .last()
}

/// Index of the first deretraction move in a segment
fn first_deretraction(segment: &Segment) -> Option<usize> {
    segment
        .steps()
        .into_iter()
        .find(|(_, step)| step.kind == MoveKind::Retraction && step.mv.e.is_some_and(|e| e > 0.0))
        .map(|(i, _)| i)
}

impl RewritePolicy for BlipRemover {
    fn name(&self) -> &str {
        "BlipRemover"
    }

    fn description(&self) -> &str {
        "Remove extrusions shorter than the nozzle diameter and rebalance retractions"
    }

    fn segmenter_options(&self) -> SegmenterOptions {
        SegmenterOptions::new().with_toggle(RegionToggle::named("BLIP_REMOVER", false))
    }

    fn rewrite_segment(
        &mut self,
        window: &mut SegmentWindow<'_>,
        _report: &mut RewriteReport,
    ) -> Result<SegmentAction> {
        let length = window.current().extrusion_length();
        if length > 0.0 && length < self.nozzle_diameter {
            debug!(
                "Layer {} segment {}: removing {:.3}mm blip",
                window.layer(),
                window.index(),
                length
            );
            let segment = window.current_mut();
            let remnants = Self::remnants(segment);
            let mut splicer = Splicer::new(&mut segment.lines);
            let end = splicer.len();
            splicer.delete_range(0, end);
            splicer.insert_many_at(0, remnants);
            return Ok(SegmentAction::Removed);
        }

        let (Some(previous), current) = window.previous_and_current_mut() else {
            return Ok(SegmentAction::Keep);
        };
        let Some(gap) = previous.end_point.planar_distance(&current.start_point) else {
            return Ok(SegmentAction::Keep);
        };

        let retraction = last_retraction(previous);
        let retracted = retraction.is_some_and(|(_, e)| e < 0.0);

        if gap > self.wipe_threshold && !retracted {
            let mut splicer = Splicer::new(&mut previous.lines);
            let end = splicer.len();
            splicer.insert_many_at(end, [RETRACTION_START.to_string(), self.retraction_line("-")]);

            // After the travel that opens the segment
            Splicer::new(&mut current.lines)
                .insert_many_at(1, [self.retraction_line(""), RETRACTION_END.to_string()]);
            return Ok(SegmentAction::Rewritten);
        }

        if gap <= self.wipe_threshold && retracted {
            if let (Some((retract_at, _)), Some(deretract_at)) =
                (retraction, first_deretraction(current))
            {
                Splicer::new(&mut previous.lines).replace(retract_at, REMOVE_RETRACTION_START);
                Splicer::new(&mut current.lines).replace(deretract_at, REMOVE_RETRACTION_END);
                return Ok(SegmentAction::Rewritten);
            }
        }

        Ok(SegmentAction::Keep)
    }

    fn settings(&self) -> Vec<(String, String)> {
        vec![("wipe_threshold".to_string(), self.wipe_threshold.to_string())]
    }
}

impl PostProcessor for BlipRemover {
    fn name(&self) -> &str {
        RewritePolicy::name(self)
    }

    fn description(&self) -> &str {
        RewritePolicy::description(self)
    }

    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport> {
        let before = count_retractions(lines.as_slice());
        let mut report = run_policy(self, lines)?;
        report.set("retractions_before", before);
        report.set("retractions_after", count_retractions(lines.as_slice()));
        report.set("blips_removed", report.segments_removed);
        Ok(report)
    }

    fn settings(&self) -> Vec<(String, String)> {
        RewritePolicy::settings(self)
    }
}
