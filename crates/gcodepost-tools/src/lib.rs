//! # GCodePost Tools
//!
//! Rewrite policies built on the GCodePost engine. Segment tools implement
//! [`RewritePolicy`] and run through the segment-tree driver; stream tools
//! implement [`PostProcessor`] directly over the line list.

pub mod blip_remover;
pub mod gap_closer;
pub mod last_ram_remover;
pub mod pipeline;
pub mod report;
pub mod toolchange_info;
pub mod toolhead_reorder;
pub mod travel_multiplier;
pub mod wipe_hop;

pub use blip_remover::{BlipRemover, BlipRemoverOptions};
pub use gap_closer::{GapCloser, GapCloserOptions};
pub use last_ram_remover::LastRamRemover;
pub use pipeline::{
    append_footer, apply_policy, footer_lines, run_policy, PostProcessor, RewritePolicy,
    SegmentAction, SegmentWindow,
};
pub use report::RewriteReport;
pub use toolchange_info::{format_minutes, ToolchangeEntry, ToolchangeInfo};
pub use toolhead_reorder::ToolheadReorder;
pub use travel_multiplier::{TravelMultiplier, TravelMultiplierOptions};
pub use wipe_hop::{WipeHop, WipeHopOptions};
