// crates/mediaforge-cli/src/main.rs
//
// `mediaforge` binary. Parses the command line, installs logging, initialises
// FFmpeg once, then hands off to one of the commands. Anything a command
// returns as an error is printed by anyhow with its context chain.

mod commands;
mod config;
mod helpers;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use config::{Cli, Commands, SplitConfig, TranscodeConfig};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    helpers::log::init(cli.verbose);
    ffmpeg_the_third::init().context("FFmpeg init failed")?;

    match cli.command {
        Commands::Transcode { files, out_dir, encoder, workers, json } => {
            let cfg = TranscodeConfig::new(files, out_dir, &encoder, workers, json)?;
            commands::transcode::run(cfg)
        }
        Commands::Split { file, cuts, out_dir, merge, skip } => {
            let cfg = SplitConfig::new(file, &cuts, out_dir, merge.as_deref(), skip)?;
            commands::split::run(cfg)
        }
        Commands::Probe { file, json } => commands::probe::run(&file, json),
    }
}
