use std::path::PathBuf;

use colored::Colorize;

use crate::backup::{
    force_from_env, run_backup, run_tracked_backup, schedule_allows, TabOutcome, TabReport,
};
use crate::cli::settings_for;
use crate::credentials;
use crate::error::{LedgerError, Result};
use crate::settings::shellexpand_path;

pub fn run(config: Option<&PathBuf>, force: bool, track: bool) -> Result<()> {
    let settings = settings_for(config)?;
    let today = chrono::Local::now().date_naive();
    if !schedule_allows(today, force || force_from_env()) {
        println!(
            "Backup skipped: today is {}, backups run on the 1st and 16th (use --force to override).",
            today.format("%d/%m/%Y")
        );
        return Ok(());
    }

    let creds = credentials::resolve(&PathBuf::from(shellexpand_path(&settings.credentials_file)))?;
    println!("Credentials: {} ({})", creds.account.client_email, creds.origin);

    let workbook_dir = settings.workbook_dir();
    let reports = if track {
        run_tracked_backup(&settings.backup, &workbook_dir, &settings.backup_state_path())?
    } else {
        run_backup(&settings.backup, &workbook_dir, None)?
    };

    for line in format_reports(&reports) {
        println!("{line}");
    }

    let missing = reports
        .iter()
        .filter(|r| matches!(r.outcome, TabOutcome::Missing(_)))
        .count();
    if missing > 0 {
        return Err(LedgerError::Other(format!(
            "{missing} tab pair(s) could not be backed up"
        )));
    }
    Ok(())
}

fn format_reports(reports: &[TabReport]) -> Vec<String> {
    reports
        .iter()
        .map(|r| {
            let pair = format!("{} -> {}", r.source_tab, r.destination_tab);
            match &r.outcome {
                TabOutcome::Copied(n) => format!("{} {pair}: {n} row(s) appended", "OK".green().bold()),
                TabOutcome::NothingNew => format!("{} {pair}: nothing to append", "--".dimmed()),
                TabOutcome::Missing(tab) => {
                    format!("{} {pair}: tab {tab} not found", "MISSING".red().bold())
                }
            }
        })
        .collect()
}
