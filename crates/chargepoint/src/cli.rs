//! Clap derive structures for the `chargepoint` binary.

use std::path::PathBuf;

use clap::Parser;

/// chargepoint -- mirror live ChargePoint station status into a state tree
#[derive(Debug, Parser)]
#[command(
    name = "chargepoint",
    version,
    about = "Poll ChargePoint charging stations on a fixed interval",
    long_about = "Polls the ChargePoint station info API for every configured station,\n\
        normalizes the responses, and keeps an in-memory state tree up to date.\n\n\
        Stations, interval and timeout are read from a TOML config file and\n\
        CHARGEPOINT_* environment variables."
)]
pub struct Cli {
    /// Path to the config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CHARGEPOINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run a single cycle, print the state tree as JSON and exit
    #[arg(long)]
    pub once: bool,
}
