use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "tally")]
#[command(version, about = "Personal asset ledger valuation and return analysis")]
#[command(
    long_about = "Read a directory of asset files (goods, transactions, checkpoints) and report holdings, portfolio shares, profit and loss, simple return and XIRR, per holding and in aggregate."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a data directory and print the report
    Run {
        /// Directory holding the assets*.yaml / assets*.csv files
        dir: PathBuf,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Value the portfolio as of this date (YYYY-MM-DD) instead of today
        #[arg(long = "as-of")]
        as_of: Option<String>,

        /// Also print one report per checkpoint segment
        #[arg(long)]
        history: bool,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a data directory loads and values without errors
    Validate {
        /// Directory holding the asset files
        dir: PathBuf,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write starter asset files into a directory
    Init {
        /// Target directory (created if missing)
        dir: PathBuf,
    },
}
