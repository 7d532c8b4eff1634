//! Wipe and hop before long travels
//!
//! A stream tool: before every travel longer than the threshold the nozzle
//! wipes a short distance past the end of the last path, lifts, travels and
//! lowers again. A Z-only move still pending when the travel is found (the
//! layer change) is dropped; the lift and lower moves take its place.

use gcodepost_core::{LinearMove, Result};
use gcodepost_engine::{
    parse_move, PositionTracker, RegionToggle, SlicerConfig, SlicerFeature, Splicer, WIPE_END,
    WIPE_START,
};
use tracing::debug;

use crate::pipeline::PostProcessor;
use crate::report::RewriteReport;

/// User options for [`WipeHop`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WipeHopOptions {
    /// Height to lift during the travel, in mm
    pub lift_z: f64,
    /// Wipe distance as a multiple of the nozzle diameter
    pub wipe_multiplier: f64,
    /// Travel distance above which the wipe and hop is added
    ///
    /// Defaults to the slicer's minimum travel after retraction.
    pub wipe_threshold: Option<f64>,
}

impl Default for WipeHopOptions {
    fn default() -> Self {
        Self {
            lift_z: 0.2,
            wipe_multiplier: 2.0,
            wipe_threshold: None,
        }
    }
}

/// Adds a wipe and a Z hop around long travels
#[derive(Debug, Clone)]
pub struct WipeHop {
    options: WipeHopOptions,
    travel_speed: f64,
    travel_speed_z: f64,
    wipe_distance: f64,
    wipe_threshold: f64,
}

impl WipeHop {
    /// Resolve the slicer settings the rewrite depends on
    pub fn from_config(config: &SlicerConfig, options: WipeHopOptions) -> Result<Self> {
        config.reject(&[SlicerFeature::ArcFitting])?;

        let wipe_threshold = match options.wipe_threshold {
            Some(threshold) => threshold,
            None => config.retract_before_travel()?,
        };

        Ok(Self {
            options,
            travel_speed: config.travel_speed()?,
            travel_speed_z: config.travel_speed_z()?,
            wipe_distance: config.nozzle_diameter()? * options.wipe_multiplier,
            wipe_threshold,
        })
    }

    /// Wipe distance in mm
    pub fn wipe_distance(&self) -> f64 {
        self.wipe_distance
    }

    fn z_move(&self, z: f64) -> String {
        LinearMove::new()
            .with_z(z)
            .with_f(self.travel_speed_z)
            .to_gcode()
    }
}

fn is_z_only(mv: &LinearMove) -> bool {
    mv.z.is_some() && mv.x.is_none() && mv.y.is_none() && mv.e.is_none()
}

impl PostProcessor for WipeHop {
    fn name(&self) -> &str {
        "WipeHop"
    }

    fn description(&self) -> &str {
        "Wipe and lift the nozzle before long travel moves"
    }

    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport> {
        let mut report = RewriteReport::new(PostProcessor::name(self));
        report.lines_before = lines.len();

        let mut toggle = RegionToggle::named("CUSTOM_HOP", false);
        let mut tracker = PositionTracker::new();
        let mut pending_z: Option<usize> = None;

        let mut splicer = Splicer::new(lines);
        while let Some(line) = splicer.current().map(String::from) {
            if let Some(enabled) = toggle.observe(&line) {
                if !enabled {
                    tracker.reset();
                    pending_z = None;
                }
                splicer.advance();
                continue;
            }
            let Some(mv) = parse_move(&line).filter(|_| toggle.is_enabled()) else {
                splicer.advance();
                continue;
            };

            let from = tracker.current();
            let to = from.apply_move(&mv);
            let heights = match (from.z, to.z) {
                (Some(from_z), Some(to_z))
                    if mv.e.is_none()
                        && from
                            .planar_distance(&to)
                            .is_some_and(|d| d > self.wipe_threshold) =>
                {
                    Some((from_z, to_z))
                }
                _ => None,
            };

            let Some((from_z, to_z)) = heights else {
                let step = tracker.step(&mv);
                if is_z_only(&mv) {
                    pending_z = Some(splicer.cursor());
                } else if step.kind.is_extrusion() {
                    pending_z = None;
                }
                splicer.advance();
                continue;
            };

            if let Some(index) = pending_z.take() {
                splicer.delete_range(index, index + 1);
            }

            let mut before = Vec::with_capacity(4);
            match from.project_beyond(&tracker.previous_planar(), self.wipe_distance) {
                Some(wipe) => {
                    before.push(WIPE_START.to_string());
                    before.push(
                        LinearMove::to_planar(&wipe)
                            .with_f(self.travel_speed)
                            .to_gcode(),
                    );
                    before.push(WIPE_END.to_string());
                }
                None => debug!("No direction to wipe in before travel to {}", to),
            }
            before.push(self.z_move(from_z + self.options.lift_z));

            let at = splicer.cursor();
            splicer.insert_many_at(at, before);
            let at = splicer.cursor();
            splicer.insert_at(at + 1, self.z_move(to_z));

            tracker.step(&mv);
            report.count("hops_added", 1);

            // Past the travel and the lower move
            splicer.advance();
            splicer.advance();
        }

        report.lines_after = lines.len();
        Ok(report)
    }

    fn settings(&self) -> Vec<(String, String)> {
        vec![
            ("lift_z".to_string(), self.options.lift_z.to_string()),
            (
                "wipe_multiplier".to_string(),
                self.options.wipe_multiplier.to_string(),
            ),
            ("wipe_threshold".to_string(), self.wipe_threshold.to_string()),
        ]
    }
}
