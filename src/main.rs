use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eeg_spectrograms::{AttentionState, Pipeline, RunConfig, SplitMode, split_by_state};
use log::{error, info};

#[derive(Parser)]
#[command(
    name = "eeg-spectrograms",
    author,
    version,
    about = "Render per-channel STFT spectrograms from EEG recordings"
)]
struct Cli {
    /// Root directory holding the raw recordings
    #[arg(long, global = true, default_value = "data")]
    data_root: PathBuf,

    /// Root directory spectrogram images are written under
    #[arg(long, global = true, default_value = "spectrograms")]
    output_root: PathBuf,

    /// Also write the run summary as JSON to this file
    #[arg(long, global = true)]
    summary: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate spectrograms for every recording under the data root
    GenerateAll,
    /// Generate spectrograms for one attention-state subdirectory
    GenerateState {
        /// FOCUSED, UNFOCUSED, DROWSY or ALL
        state: AttentionState,
    },
    /// File raw recordings into per-state subdirectories
    SplitByState {
        /// FOCUSED, UNFOCUSED, DROWSY or ALL
        state: AttentionState,
        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(true)` for a fully clean run.
fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Command::GenerateAll => generate(
            &cli.data_root,
            &cli.output_root,
            AttentionState::All,
            cli.summary,
        ),
        Command::GenerateState { state } => {
            generate(&cli.data_root, &cli.output_root, state, cli.summary)
        }
        Command::SplitByState { state, move_files } => {
            let mode = if move_files { SplitMode::Move } else { SplitMode::Copy };
            let report = split_by_state(&cli.data_root, state, mode)?;
            if let Some(path) = cli.summary {
                std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
                info!("summary written to {}", path.display());
            }
            Ok(report.failed == 0)
        }
    }
}

fn generate(
    data_root: &Path,
    output_root: &Path,
    scope: AttentionState,
    summary_path: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let pipeline = Pipeline::new(RunConfig::new(data_root, output_root))?;
    let summary = pipeline.run(scope)?;
    if let Some(path) = summary_path {
        summary.write_json(&path)?;
        info!("summary written to {}", path.display());
    }
    Ok(summary.is_clean())
}
