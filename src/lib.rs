//! # GCodePost
//!
//! Post-processing tools for G-code produced by FDM slicers.
//!
//! ## Architecture
//!
//! GCodePost is organized as a workspace with multiple crates:
//!
//! 1. **gcodepost-core** - Move and position types, number formatting, errors
//! 2. **gcodepost-engine** - Move parser, position tracking, segmentation, splicing
//! 3. **gcodepost-tools** - Rewrite policies and the tools built on them
//! 4. **gcodepost-settings** - Persisted per-tool default options
//! 5. **gcodepost** - Main binary that loads, rewrites and stores a file
//!
//! ## Tools
//!
//! - **Gap Closer**: closes gaps at the start of extrusions after deretracted travels
//! - **Travel Extrusion Multiplier**: over-extrudes a short distance after travels
//! - **Blip Remover**: drops extrusions shorter than the nozzle and rebalances retractions
//! - **Wipe Hop**: wipes and lifts before long travels
//! - **Toolhead Reorder**: prints the shortest object of each layer first
//! - **Last Ram Remover**: drops the phantom toolchange at the end of a wipe tower print
//! - **Toolchange Info**: reports toolchange timing (read-only)

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

pub use gcodepost_core::{Error, LinearMove, MoveKind, Position, Result};
pub use gcodepost_engine::{read_lines, write_lines, SlicerConfig};
pub use gcodepost_settings::{default_path, SettingsError, ToolSettings};
pub use gcodepost_tools::{
    append_footer, BlipRemover, BlipRemoverOptions, GapCloser, GapCloserOptions, LastRamRemover,
    PostProcessor, RewriteReport, ToolchangeInfo, ToolheadReorder, TravelMultiplier,
    TravelMultiplierOptions, WipeHop, WipeHopOptions,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Log verbosity selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Informational messages
    #[default]
    Normal,
    /// Debug output
    Verbose,
}

impl Verbosity {
    /// Pick a verbosity from the `-v` and `-q` flags
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::Verbose,
            (false, true) => Self::Quiet,
            (false, false) => Self::Normal,
        }
    }

    fn directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }
}

/// Initialize logging
///
/// Log output goes to stderr so stdout only carries the run summary.
/// `RUST_LOG` takes precedence over the default level unless `-v` or `-q`
/// was given.
pub fn init_logging(verbosity: Verbosity) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = match verbosity {
        Verbosity::Normal => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(verbosity.directive())),
        _ => EnvFilter::new(verbosity.directive()),
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity == Verbosity::Verbose)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load tool defaults from `path`, or from the default location
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ToolSettings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Ok(path) => path,
            Err(e) => {
                debug!("{}; using built-in tool defaults", e);
                return Ok(ToolSettings::default());
            }
        },
    };

    ToolSettings::load_from_file(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

/// Rewrite a G-code file with a tool
///
/// The tool is built from the slicer configuration embedded in the file.
/// The result, with the tool's footer appended, is written to `output`
/// (or back over `input`). Nothing is written when any step fails.
pub fn process_file<F>(input: &Path, output: Option<&Path>, build: F) -> anyhow::Result<RewriteReport>
where
    F: FnOnce(&SlicerConfig) -> Result<Box<dyn PostProcessor>>,
{
    let mut lines = read_lines(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let config = SlicerConfig::from_lines(&lines);
    debug!("Resolved {} slicer settings", config.len());

    let mut tool = build(&config).context("Invalid slicer configuration")?;
    info!("Running {} on {}", tool.name(), input.display());

    let report = tool
        .process(&mut lines)
        .with_context(|| format!("{} failed", tool.name()))?;
    append_footer(tool.as_ref(), &mut lines);

    let target = output.unwrap_or(input);
    write_lines(target, &lines)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    info!("Wrote {}", target.display());

    Ok(report)
}

/// Collect the toolchange report of a G-code file
pub fn toolchange_report(input: &Path) -> anyhow::Result<ToolchangeInfo> {
    let lines = read_lines(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Ok(ToolchangeInfo::from_lines(&lines))
}
