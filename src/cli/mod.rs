//! Command-line interface

mod logging;
mod run;

pub use run::run;

use clap::Parser;
use mergebot::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

/// Update and merge GitHub pull requests driven by labels
#[derive(Parser, Debug)]
#[command(name = "mergebot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Serve an HTTP trigger instead of running a single pass
    #[arg(long)]
    pub server: bool,

    /// Override the configured dry-run switch
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: Option<bool>,

    /// Override the configured server port
    #[arg(long)]
    pub port: Option<u16>,
}
