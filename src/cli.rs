//! Command-line surface (spec §6): a single required `--config` flag, plus
//! the couple of overrides that do not belong in a run's persisted config.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the INI run configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Seed the corpus RNG instead of drawing from entropy, for
    /// reproducible runs.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Stop after this many seconds instead of running indefinitely.
    #[arg(short, long)]
    pub time: Option<u64>,
}
