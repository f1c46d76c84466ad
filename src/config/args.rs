//! Command-line argument parsing

use std::path::PathBuf;

use clap::Parser;

/// shortstat is a web service that redirects short links and records
/// per-link page views and unique visitors.
#[derive(Debug, Clone, Parser)]
#[command(name = "shortstat", version, about)]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Validate the configuration file and exit
    #[arg(long)]
    pub check: bool,
}
