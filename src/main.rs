//! GCodePost command line entry point

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gcodepost::{
    init_logging, load_settings, process_file, toolchange_report, BlipRemover,
    BlipRemoverOptions, Error, GapCloser, GapCloserOptions, LastRamRemover, PostProcessor,
    RewriteReport, SlicerConfig, ToolSettings, ToolheadReorder, TravelMultiplier,
    TravelMultiplierOptions, Verbosity, WipeHop, WipeHopOptions, BUILD_DATE, VERSION,
};

#[derive(Parser)]
#[command(name = "gcodepost")]
#[command(version, about = "Post-processing tools for slicer G-code", long_about = None)]
struct Cli {
    /// Debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Tool defaults file (default: <config dir>/gcodepost/settings.toml)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Write the result here instead of over the input file
    #[arg(long, global = true, value_name = "PATH")]
    output_file_path: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Close gaps at the start of extrusions after deretracted travels
    GapCloser {
        /// G-code file
        file: PathBuf,

        /// How far to back up the start of an extrusion, in mm
        #[arg(long)]
        back_up_distance: Option<f64>,
    },

    /// Multiply extrusion for a short distance after travels
    TravelMultiplier {
        /// G-code file
        file: PathBuf,

        /// Extrusion multiplier
        #[arg(long)]
        multiplier: Option<f64>,

        /// Extrusion distance the multiplier covers, in mm
        #[arg(long)]
        distance: Option<f64>,
    },

    /// Remove extrusions shorter than the nozzle diameter
    BlipRemover {
        /// G-code file
        file: PathBuf,

        /// Travel distance above which a retraction is required
        #[arg(long)]
        wipe_threshold: Option<f64>,
    },

    /// Wipe and lift the nozzle before long travels
    WipeHop {
        /// G-code file
        file: PathBuf,

        /// Height to lift during the travel, in mm
        #[arg(long)]
        lift_z: Option<f64>,

        /// Wipe distance as a multiple of the nozzle diameter
        #[arg(long)]
        wipe_multiplier: Option<f64>,

        /// Travel distance above which the wipe and hop is added
        #[arg(long)]
        wipe_threshold: Option<f64>,
    },

    /// Print the shortest object of each layer first
    ToolheadReorder {
        /// G-code file
        file: PathBuf,
    },

    /// Remove the ram and tower wipe after the final toolchange
    LastRamRemover {
        /// G-code file
        file: PathBuf,
    },

    /// Report toolchange timing (read-only)
    ToolchangeInfo {
        /// G-code file
        file: PathBuf,
    },
}

impl Commands {
    /// Input file of the command
    fn file(&self) -> &Path {
        match self {
            Self::GapCloser { file, .. }
            | Self::TravelMultiplier { file, .. }
            | Self::BlipRemover { file, .. }
            | Self::WipeHop { file, .. }
            | Self::ToolheadReorder { file }
            | Self::LastRamRemover { file }
            | Self::ToolchangeInfo { file } => file,
        }
    }

    /// Merge the command's option flags over the file defaults
    fn apply_flags(&self, mut settings: ToolSettings) -> ToolSettings {
        match self {
            Self::GapCloser {
                back_up_distance, ..
            } => {
                if let Some(value) = back_up_distance {
                    settings.gap_closer.back_up_distance = *value;
                }
            }
            Self::TravelMultiplier {
                multiplier,
                distance,
                ..
            } => {
                if let Some(value) = multiplier {
                    settings.travel_multiplier.multiplier = *value;
                }
                if let Some(value) = distance {
                    settings.travel_multiplier.distance = *value;
                }
            }
            Self::BlipRemover { wipe_threshold, .. } => {
                if wipe_threshold.is_some() {
                    settings.blip_remover.wipe_threshold = *wipe_threshold;
                }
            }
            Self::WipeHop {
                lift_z,
                wipe_multiplier,
                wipe_threshold,
                ..
            } => {
                if let Some(value) = lift_z {
                    settings.wipe_hop.lift_z = *value;
                }
                if let Some(value) = wipe_multiplier {
                    settings.wipe_hop.wipe_multiplier = *value;
                }
                if wipe_threshold.is_some() {
                    settings.wipe_hop.wipe_threshold = *wipe_threshold;
                }
            }
            Self::ToolheadReorder { .. }
            | Self::LastRamRemover { .. }
            | Self::ToolchangeInfo { .. } => {}
        }
        settings
    }
}

/// Build the tool of a command from validated tool settings
fn build_tool(
    command: &Commands,
    settings: &ToolSettings,
    config: &SlicerConfig,
) -> gcodepost::Result<Box<dyn PostProcessor>> {
    let tool: Box<dyn PostProcessor> = match command {
        Commands::GapCloser { .. } => {
            let options = GapCloserOptions {
                back_up_distance: settings.gap_closer.back_up_distance,
            };
            Box::new(GapCloser::from_config(config, options)?)
        }
        Commands::TravelMultiplier { .. } => {
            let options = TravelMultiplierOptions {
                multiplier: settings.travel_multiplier.multiplier,
                distance: settings.travel_multiplier.distance,
            };
            Box::new(TravelMultiplier::from_config(config, options)?)
        }
        Commands::BlipRemover { .. } => {
            let options = BlipRemoverOptions {
                wipe_threshold: settings.blip_remover.wipe_threshold,
            };
            Box::new(BlipRemover::from_config(config, options)?)
        }
        Commands::WipeHop { .. } => {
            let options = WipeHopOptions {
                lift_z: settings.wipe_hop.lift_z,
                wipe_multiplier: settings.wipe_hop.wipe_multiplier,
                wipe_threshold: settings.wipe_hop.wipe_threshold,
            };
            Box::new(WipeHop::from_config(config, options)?)
        }
        Commands::ToolheadReorder { .. } => Box::new(ToolheadReorder::new()),
        Commands::LastRamRemover { .. } => Box::new(LastRamRemover::new()),
        Commands::ToolchangeInfo { .. } => {
            return Err(Error::other("toolchange-info does not rewrite files"))
        }
    };
    Ok(tool)
}

fn print_report(report: &RewriteReport, json: bool) -> Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    init_logging(Verbosity::from_flags(cli.verbose, cli.quiet))?;
    tracing::debug!("gcodepost {} (built {})", VERSION, BUILD_DATE);

    if let Commands::ToolchangeInfo { file } = &cli.command {
        let info = toolchange_report(file)?;
        if cli.json {
            println!("{}", info.to_json()?);
        } else {
            print!("{}", info);
        }
        return Ok(());
    }

    let settings = cli
        .command
        .apply_flags(load_settings(cli.settings.as_deref())?);
    settings.validate().context("Invalid tool options")?;

    let report = process_file(
        cli.command.file(),
        cli.output_file_path.as_deref(),
        |config| build_tool(&cli.command, &settings, config),
    )?;
    print_report(&report, cli.json)
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
