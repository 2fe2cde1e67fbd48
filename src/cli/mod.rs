pub mod backup;
pub mod init;
pub mod report;
pub mod summary;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::aggregate::Granularity;
use crate::error::Result;
use crate::settings::{load_settings, Settings};

#[derive(Parser)]
#[command(
    name = "ledgerdash",
    version,
    about = "Net profit reports, trends and forecasts from a sales and expenses ledger."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/ledgerdash/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an HTML report.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Print net profit per period to the terminal.
    Summary {
        /// Bucket size
        #[arg(long, value_enum, default_value = "month")]
        granularity: Granularity,
    },
    /// Append the entry tabs to the history spreadsheet (runs on the 1st and 16th).
    Backup {
        /// Run regardless of the day of month
        #[arg(long)]
        force: bool,
        /// Append only rows not copied by a previous tracked run
        #[arg(long)]
        track: bool,
    },
    /// Write the default settings file.
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Weekly net profit for one month.
    Weekly {
        /// Month: YYYY-MM (default: current month)
        #[arg(long)]
        month: Option<String>,
        /// Output path (default: <output_dir>/<configured file name>)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Monthly net profit history.
    Monthly {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Next-month net profit forecast with audit table.
    Forecast {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Sales KPI dashboard.
    Sales {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

pub(crate) fn settings_for(config: Option<&PathBuf>) -> Result<Settings> {
    load_settings(config.map(PathBuf::as_path))
}
