//! Command-line front end for the collation pipeline.
//!
//! Per-file and per-milestone trouble is logged and skipped; the exit
//! code is non-zero only for fatal startup failures (unreadable input
//! directory, invalid configuration file).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mscollate::pipeline::tei::TeiTokenizer;
use mscollate::pipeline::{grouping, Assembler};
use mscollate::CollationConfig;

#[derive(Parser)]
#[command(name = "mscollate", version, about)]
struct Cli {
    /// Make output more verbose.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge multi-part transcription exports into one document per
    /// manuscript.
    Merge {
        /// Directory of raw per-part export files.
        indir: PathBuf,
        /// Directory for the merged documents.
        outdir: PathBuf,
    },
    /// Collate witnesses per milestone into collation-engine input files.
    Collate {
        /// Directory of witness transcription files.
        indir: PathBuf,
        /// Directory for the per-milestone collation sets.
        outdir: PathBuf,
        /// JSON configuration file (milestones, skip list, priority).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Merge { indir, outdir } => {
            std::fs::create_dir_all(&outdir)
                .map_err(mscollate::PipelineError::from)
                .and_then(|()| grouping::merge_directory(&indir, &outdir))
                .map(|count| {
                    tracing::info!(manuscripts = count, "merge complete");
                })
        }
        Command::Collate { indir, outdir, config } => {
            let config = match config {
                Some(path) => match CollationConfig::from_file(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::error!(error = %e, "cannot load configuration");
                        return ExitCode::FAILURE;
                    }
                },
                None => CollationConfig::default(),
            };
            if config.milestones.is_empty() {
                tracing::warn!("no milestones configured, nothing to collate");
            }
            let assembler = Assembler::new(Box::new(TeiTokenizer), config);
            assembler.run(&indir, &outdir).map(|summary| {
                tracing::info!(
                    written = summary.milestones_written,
                    empty = summary.milestones_empty,
                    failed = summary.milestones_failed,
                    excluded = summary.witnesses_excluded,
                    "collate complete"
                );
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}
