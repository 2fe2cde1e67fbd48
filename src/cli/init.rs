use std::path::PathBuf;

use colored::Colorize;

use crate::error::{LedgerError, Result};
use crate::settings::{default_settings_path, save_settings, Settings};

pub fn run(config: Option<&PathBuf>, force: bool) -> Result<()> {
    let path = config.cloned().unwrap_or_else(default_settings_path);
    if path.exists() && !force {
        return Err(LedgerError::Configuration(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    let settings = Settings::default();
    save_settings(&settings, &path)?;
    std::fs::create_dir_all(settings.workbook_dir())?;

    println!("{} {}", "Settings written:".green().bold(), path.display());
    println!("Workbooks: {}", settings.workbook_dir().display());
    println!(
        "Sales:     {}/{}  Expenses: {}/{}",
        settings.sales.spreadsheet_id,
        settings.sales.tab,
        settings.expenses.spreadsheet_id,
        settings.expenses.tab
    );
    Ok(())
}
