//! Rewrite policy contract and drivers
//!
//! Two shapes of tool exist:
//! - Segment tools implement [`RewritePolicy`]. The driver segments the
//!   stream, hands each enabled segment to the policy together with its
//!   neighbours, and flattens the tree afterwards.
//! - Stream tools implement [`PostProcessor`] and walk the line list with a
//!   [`Splicer`](gcodepost_engine::Splicer) themselves.

use gcodepost_core::Result;
use gcodepost_engine::{Layer, PrintTree, Segment, Segmenter, SegmenterOptions};
use tracing::{debug, info};

use crate::report::RewriteReport;

/// Outcome of rewriting one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAction {
    /// Left unchanged
    Keep,
    /// Rewritten in place; still a neighbour for later segments
    Rewritten,
    /// Removed; whatever lines remain are kept but it is no longer a neighbour
    Removed,
}

/// A segment with access to its neighbours inside the same layer
pub struct SegmentWindow<'a> {
    layer: usize,
    index: usize,
    current: &'a mut Segment,
    previous: Option<&'a mut Segment>,
    next: Option<&'a Segment>,
}

impl<'a> SegmentWindow<'a> {
    /// Layer index
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Segment index inside the layer
    pub fn index(&self) -> usize {
        self.index
    }

    /// The segment being rewritten
    pub fn current(&self) -> &Segment {
        self.current
    }

    /// The segment being rewritten, mutably
    pub fn current_mut(&mut self) -> &mut Segment {
        self.current
    }

    /// Last surviving enabled segment before this one in the layer
    pub fn previous(&self) -> Option<&Segment> {
        self.previous.as_deref()
    }

    /// Both the previous surviving segment and the current one, mutably
    pub fn previous_and_current_mut(&mut self) -> (Option<&mut Segment>, &mut Segment) {
        (self.previous.as_deref_mut(), self.current)
    }

    /// Next segment in the layer, as segmented
    pub fn next(&self) -> Option<&Segment> {
        self.next
    }
}

/// Contract for segment level rewrite tools
///
/// Policies decide per segment whether it survives unchanged, is rewritten
/// or is removed, and issue the splices that make it so.
pub trait RewritePolicy {
    /// Name written to the footer and report
    fn name(&self) -> &str;

    /// Short description of the rewrite
    fn description(&self) -> &str;

    /// How the stream is segmented for this policy
    fn segmenter_options(&self) -> SegmenterOptions;

    /// Called before the segments of a layer are visited
    fn start_layer(&mut self, _layer: &Layer, _report: &mut RewriteReport) {}

    /// Rewrite one enabled segment
    fn rewrite_segment(
        &mut self,
        window: &mut SegmentWindow<'_>,
        report: &mut RewriteReport,
    ) -> Result<SegmentAction>;

    /// Footer settings as `(name, value)` pairs
    fn settings(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Contract shared by every tool that rewrites a stream
pub trait PostProcessor {
    /// Name written to the footer and report
    fn name(&self) -> &str;

    /// Short description of the rewrite
    fn description(&self) -> &str;

    /// Rewrite the stream in place
    fn process(&mut self, lines: &mut Vec<String>) -> Result<RewriteReport>;

    /// Footer settings as `(name, value)` pairs
    fn settings(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Visit every enabled segment of a tree with a policy
pub fn apply_policy<P: RewritePolicy + ?Sized>(
    policy: &mut P,
    tree: &mut PrintTree,
    report: &mut RewriteReport,
) -> Result<()> {
    for layer in &mut tree.layers {
        policy.start_layer(layer, report);

        let mut previous: Option<usize> = None;
        for i in 0..layer.segments.len() {
            let (before, rest) = layer.segments.split_at_mut(i);
            let Some((current, after)) = rest.split_first_mut() else {
                break;
            };

            if !current.enabled {
                previous = None;
                continue;
            }

            let mut window = SegmentWindow {
                layer: layer.index,
                index: i,
                current,
                previous: match previous {
                    Some(p) => before.get_mut(p),
                    None => None,
                },
                next: after.first(),
            };

            match policy.rewrite_segment(&mut window, report)? {
                SegmentAction::Keep => previous = Some(i),
                SegmentAction::Rewritten => {
                    report.segments_modified += 1;
                    previous = Some(i);
                }
                SegmentAction::Removed => report.segments_removed += 1,
            }
        }
    }
    Ok(())
}

/// Segment, rewrite and flatten a stream with a policy
pub fn run_policy<P: RewritePolicy + ?Sized>(
    policy: &mut P,
    lines: &mut Vec<String>,
) -> Result<RewriteReport> {
    let mut report = RewriteReport::new(policy.name());
    report.lines_before = lines.len();

    let segmenter = Segmenter::new(policy.segmenter_options());
    let mut tree = segmenter.segment(std::mem::take(lines))?;
    report.layers = tree.layers.len();
    report.segments = tree.segment_count();
    debug!(
        "{}: {} layers, {} segments",
        policy.name(),
        report.layers,
        report.segments
    );

    apply_policy(policy, &mut tree, &mut report)?;

    *lines = tree.flatten();
    report.lines_after = lines.len();
    info!(
        "{}: {} segments modified, {} removed",
        policy.name(),
        report.segments_modified,
        report.segments_removed
    );
    Ok(report)
}

/// Footer lines recording the tool and its settings
///
/// Settings are written sorted by name, followed by an empty line.
pub fn footer_lines(tool: &str, settings: &[(String, String)]) -> Vec<String> {
    let mut sorted: Vec<&(String, String)> = settings.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut lines = Vec::with_capacity(sorted.len() + 2);
    lines.push(format!("; Post-Processed With {}", tool));
    lines.extend(sorted.iter().map(|(k, v)| format!("; {} = {}", k, v)));
    lines.push(String::new());
    lines
}

/// Append the footer of a processor to a stream
pub fn append_footer<P: PostProcessor + ?Sized>(processor: &P, lines: &mut Vec<String>) {
    lines.extend(footer_lines(processor.name(), &processor.settings()));
}

/// Render a boolean setting the way the footer expects
pub(crate) fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}
