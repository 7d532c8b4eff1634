//! # GCodePost Engine
//!
//! The decomposition-and-splice engine shared by every post-processing tool.
//! Includes the move parser, position tracker, region toggles, slicer
//! configuration lookup, the print/layer/segment segmenter and the splicer.

pub mod gcode;
pub mod utils;

pub use gcode::{
    count_retractions, parse_move, Layer, MoveParser, MoveSplit, PositionTracker, PrintTree,
    RegionToggle, Segment, Segmenter, SegmenterOptions, SlicerConfig, SlicerFeature, Splicer,
    Step, WipeSpan, AFTER_LAYER_CHANGE, CONFIG_BLOCK_MARKER, COOLDOWN_PREFIX,
    FEATURE_TYPE_PREFIX, LAYER_CHANGE, WIPE_END, WIPE_START,
};

pub use utils::{join_lines, read_lines, split_lines, write_lines};
