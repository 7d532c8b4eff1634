//! Removal of the final phantom toolchange
//!
//! With a wipe tower, the slicer emits one toolchange block after the last
//! real toolchange: the filament is rammed and wiped on the tower for a
//! tool that never prints again. The block is located by its toolchange
//! number exceeding the reported total and removed together with the
//! travel to the tower.

use gcodepost_core::{Result, StructureError};
use gcodepost_engine::WIPE_END;
use tracing::info;

use crate::pipeline::PostProcessor;
use crate::report::RewriteReport;

const TOOLCHANGE_START: &str = "; CP TOOLCHANGE START";
const TOOLCHANGE_END: &str = "; CP TOOLCHANGE END";
const SEPARATOR: &str = ";------------------";
const TOTAL_TOOLCHANGES: &str = "; total toolchanges";
const STOP_OBJECT: &str = "; stop printing object";

fn marker_not_found(marker: &str) -> gcodepost_core::Error {
    StructureError::MarkerNotFound {
        marker: marker.to_string(),
    }
    .into()
}

/// Number after the last `#` of a line
fn toolchange_number(line: &str) -> Option<u32> {
    line.rsplit_once('#')?.1.trim().parse().ok()
}

/// Value of the last `; total toolchanges = N` line
fn total_toolchanges(lines: &[String]) -> Option<u32> {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with(TOTAL_TOOLCHANGES))?
        .rsplit_once('=')?
        .1
        .trim()
        .parse()
        .ok()
}

/// Line range `[start, end)` of the last ram block
pub(crate) fn find_last_ram(lines: &[String]) -> Result<(usize, usize)> {
    let toolchange = lines
        .iter()
        .rposition(|l| l == TOOLCHANGE_START)
        .ok_or_else(|| marker_not_found(TOOLCHANGE_START))?;

    let found = lines
        .get(toolchange + 1)
        .and_then(|l| toolchange_number(l))
        .ok_or_else(|| marker_not_found("toolchange #"))?;
    let total = total_toolchanges(lines).ok_or_else(|| marker_not_found(TOTAL_TOOLCHANGES))?;
    if found <= total {
        return Err(StructureError::ToolchangeMismatch { found, total }.into());
    }

    let before = &lines[..toolchange];
    let start = before
        .iter()
        .rposition(|l| l == WIPE_END)
        .or_else(|| before.iter().rposition(|l| l.starts_with(STOP_OBJECT)))
        .map(|i| i + 1)
        .ok_or_else(|| marker_not_found(WIPE_END))?;

    let end = (toolchange..lines.len().saturating_sub(1))
        .find(|&i| lines[i] == TOOLCHANGE_END && lines[i + 1].starts_with(SEPARATOR))
        .map(|i| i + 2)
        .ok_or_else(|| marker_not_found(TOOLCHANGE_END))?;

    Ok((start, end))
}

/// Removes the ram and tower wipe of the final phantom toolchange
#[derive(Debug, Clone, Default)]
pub struct LastRamRemover;

impl LastRamRemover {
    /// Create a new remover
    pub fn new() -> Self {
        Self
    }
}

impl PostProcessor for LastRamRemover {
    fn name(&self) -> &str {
        "LastRamRemover"
    }

    fn description(&self) -> &str {
        "Remove the last ram and tower wipe that follows the final toolchange"
    }

    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport> {
        let mut report = RewriteReport::new(self.name());
        report.lines_before = lines.len();

        let (start, end) = find_last_ram(lines)?;
        let removed = lines.drain(start..end).count();
        info!("Removed last ram (lines {}..{})", start, end);

        report.set("lines_removed", removed);
        report.lines_after = lines.len();
        Ok(report)
    }
}
