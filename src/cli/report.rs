use std::path::PathBuf;

use chrono::Datelike;
use colored::Colorize;

use crate::cli::{settings_for, ReportCommands};
use crate::error::Result;
use crate::pipeline::{parse_month, run_report, ReportKind};

pub fn run(config: Option<&PathBuf>, command: ReportCommands) -> Result<()> {
    let settings = settings_for(config)?;
    let (kind, output) = match command {
        ReportCommands::Weekly { month, output } => {
            let (year, month) = match month {
                Some(m) => parse_month(&m)?,
                None => {
                    let today = chrono::Local::now().date_naive();
                    (today.year(), today.month())
                }
            };
            (ReportKind::WeeklyProfit { year, month }, output)
        }
        ReportCommands::Monthly { output } => (ReportKind::MonthlyProfit, output),
        ReportCommands::Forecast { output } => (ReportKind::Forecast, output),
        ReportCommands::Sales { output } => (ReportKind::SalesDashboard, output),
    };

    let path = run_report(kind, &settings, output)?;
    println!("{} {}", "Report written:".green().bold(), path.display());
    Ok(())
}
