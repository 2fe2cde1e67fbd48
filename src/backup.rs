use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};
use crate::settings::{BackupSettings, TabMapping};
use crate::sheets::{TabRef, Workbook};

pub const FORCE_ENV_VAR: &str = "LEDGERDASH_FORCE_BACKUP";
const SCHEDULED_DAYS: [u32; 2] = [1, 16];

/// The backup runs on the 1st and 16th, or whenever it is forced.
pub fn schedule_allows(today: NaiveDate, force: bool) -> bool {
    force || SCHEDULED_DAYS.contains(&today.day())
}

pub fn force_from_env() -> bool {
    std::env::var(FORCE_ENV_VAR)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// High-water marks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighWaterMark {
    pub rows: usize,
    pub fingerprint: String,
}

/// Rows already copied per tab pair, so a re-run only appends new rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupState {
    #[serde(default)]
    pub marks: BTreeMap<String, HighWaterMark>,
}

impl BackupState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }
}

fn fingerprint(rows: &[Vec<String>]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        for cell in row {
            hasher.update(cell.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

fn mark_key(source: &Workbook, destination: &Workbook, mapping: &TabMapping) -> String {
    format!(
        "{}/{} -> {}/{}",
        source.id(),
        mapping.source,
        destination.id(),
        mapping.destination
    )
}

/// Index of the first row not yet copied. A source that shrank or whose
/// copied prefix changed was cleared and refilled, so everything is new.
fn first_new_row(data: &[Vec<String>], mark: Option<&HighWaterMark>) -> usize {
    let Some(mark) = mark else {
        return 0;
    };
    if mark.rows <= data.len() && fingerprint(&data[..mark.rows]) == mark.fingerprint {
        mark.rows
    } else {
        tracing::warn!(
            previous_rows = mark.rows,
            current_rows = data.len(),
            "source tab no longer matches the high-water mark; copying all rows"
        );
        0
    }
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TabOutcome {
    Copied(usize),
    NothingNew,
    Missing(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabReport {
    pub source_tab: String,
    pub destination_tab: String,
    pub outcome: TabOutcome,
}

/// Copy every data row (header excluded) of one source tab to its
/// destination tab. Without a state the copy is not idempotent: running it
/// twice duplicates rows.
pub fn backup_tab(
    source: &Workbook,
    destination: &Workbook,
    mapping: &TabMapping,
    state: Option<&mut BackupState>,
) -> Result<TabOutcome> {
    let rows = source.read_tab(&TabRef::parse(&mapping.source))?;
    let data = rows.get(1..).unwrap_or_default();

    let key = mark_key(source, destination, mapping);
    let start = match &state {
        Some(state) => first_new_row(data, state.marks.get(&key)),
        None => 0,
    };
    let pending = &data[start..];

    let outcome = if pending.is_empty() {
        tracing::info!(tab = %mapping.source, "no new rows to back up");
        TabOutcome::NothingNew
    } else {
        let appended = destination.append_rows(&TabRef::parse(&mapping.destination), pending)?;
        tracing::info!(
            from = %mapping.source,
            to = %mapping.destination,
            rows = appended,
            "backed up rows"
        );
        TabOutcome::Copied(appended)
    };

    if let Some(state) = state {
        state.marks.insert(
            key,
            HighWaterMark {
                rows: data.len(),
                fingerprint: fingerprint(data),
            },
        );
    }
    Ok(outcome)
}

/// Back up every configured tab pair. A missing tab is reported and the
/// remaining pairs still run; any other failure aborts.
pub fn run_backup(
    settings: &BackupSettings,
    workbook_dir: &Path,
    mut state: Option<&mut BackupState>,
) -> Result<Vec<TabReport>> {
    let source = Workbook::open(workbook_dir, &settings.source_spreadsheet)?;
    let destination = Workbook::open(workbook_dir, &settings.destination_spreadsheet)?;

    let mut reports = Vec::with_capacity(settings.tabs.len());
    for mapping in &settings.tabs {
        let outcome = match backup_tab(&source, &destination, mapping, state.as_deref_mut()) {
            Ok(outcome) => outcome,
            Err(LedgerError::SheetNotFound { spreadsheet, tab }) => {
                tracing::error!(%spreadsheet, %tab, "tab not found; skipping backup pair");
                TabOutcome::Missing(format!("{spreadsheet}/{tab}"))
            }
            Err(e) => return Err(e),
        };
        reports.push(TabReport {
            source_tab: mapping.source.clone(),
            destination_tab: mapping.destination.clone(),
            outcome,
        });
    }
    Ok(reports)
}

/// Tracked backup: load the marks, run, and save the marks even when a pair
/// fails partway so rows already appended are not appended again.
pub fn run_tracked_backup(
    settings: &BackupSettings,
    workbook_dir: &Path,
    state_path: &Path,
) -> Result<Vec<TabReport>> {
    let mut state = BackupState::load(state_path)?;
    let result = run_backup(settings, workbook_dir, Some(&mut state));
    if let Err(e) = state.save(state_path) {
        tracing::error!(path = %state_path.display(), error = %e, "could not save backup state");
        result?;
        return Err(e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(vendas: &str) -> (tempfile::TempDir, BackupSettings) {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("lancamentos");
        let dst = root.path().join("historico");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(src.join("vendas.csv"), vendas).unwrap();
        std::fs::write(src.join("gastos.csv"), "DATA E HORA,VALOR\n").unwrap();
        std::fs::write(dst.join("VENDAS.csv"), "DATA E HORA,VALOR DA VENDA\n").unwrap();
        std::fs::write(dst.join("GASTOS.csv"), "DATA E HORA,VALOR\n").unwrap();
        (root, BackupSettings::default())
    }

    fn history(root: &Path) -> Vec<Vec<String>> {
        Workbook::open(root, "historico")
            .unwrap()
            .read_tab(&TabRef::parse("VENDAS"))
            .unwrap()
    }

    const VENDAS: &str = "DATA E HORA,VALOR DA VENDA\n01/01/24 10:00,\"R$ 10,00\"\n02/01/24 11:00,\"R$ 1.234,56\"\n";

    #[test]
    fn test_schedule_gate() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        assert!(schedule_allows(day(1), false));
        assert!(schedule_allows(day(16), false));
        assert!(!schedule_allows(day(15), false));
        assert!(schedule_allows(day(15), true));
    }

    #[test]
    fn test_backup_copies_rows_verbatim() {
        let (root, settings) = setup(VENDAS);
        let reports = run_backup(&settings, root.path(), None).unwrap();
        assert_eq!(reports[0].outcome, TabOutcome::Copied(2));
        assert_eq!(reports[1].outcome, TabOutcome::NothingNew);
        let rows = history(root.path());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["02/01/24 11:00".to_string(), "R$ 1.234,56".to_string()]);
    }

    #[test]
    fn test_untracked_rerun_duplicates() {
        let (root, settings) = setup(VENDAS);
        run_backup(&settings, root.path(), None).unwrap();
        run_backup(&settings, root.path(), None).unwrap();
        assert_eq!(history(root.path()).len(), 5);
    }

    #[test]
    fn test_tracked_rerun_appends_only_new_rows() {
        let (root, settings) = setup(VENDAS);
        let mut state = BackupState::default();
        run_backup(&settings, root.path(), Some(&mut state)).unwrap();
        let reports = run_backup(&settings, root.path(), Some(&mut state)).unwrap();
        assert_eq!(reports[0].outcome, TabOutcome::NothingNew);
        assert_eq!(history(root.path()).len(), 3);

        let src = root.path().join("lancamentos").join("vendas.csv");
        std::fs::write(&src, format!("{VENDAS}03/01/24 09:00,\"R$ 7,00\"\n")).unwrap();
        let reports = run_backup(&settings, root.path(), Some(&mut state)).unwrap();
        assert_eq!(reports[0].outcome, TabOutcome::Copied(1));
        assert_eq!(history(root.path()).len(), 4);
    }

    #[test]
    fn test_tracked_cleared_source_resets_mark() {
        let (root, settings) = setup(VENDAS);
        let mut state = BackupState::default();
        run_backup(&settings, root.path(), Some(&mut state)).unwrap();

        let src = root.path().join("lancamentos").join("vendas.csv");
        std::fs::write(&src, "DATA E HORA,VALOR DA VENDA\n05/01/24 09:00,\"R$ 3,00\"\n").unwrap();
        let reports = run_backup(&settings, root.path(), Some(&mut state)).unwrap();
        assert_eq!(reports[0].outcome, TabOutcome::Copied(1));
        assert_eq!(history(root.path()).len(), 4);
    }

    #[test]
    fn test_missing_tab_does_not_abort_other_pairs() {
        let (root, mut settings) = setup(VENDAS);
        settings.tabs.insert(
            0,
            TabMapping {
                source: "estoque".to_string(),
                destination: "ESTOQUE".to_string(),
            },
        );
        let reports = run_backup(&settings, root.path(), None).unwrap();
        assert!(matches!(reports[0].outcome, TabOutcome::Missing(_)));
        assert_eq!(reports[1].outcome, TabOutcome::Copied(2));
    }

    #[test]
    fn test_tracked_state_survives_a_failing_pair() {
        let (root, settings) = setup(VENDAS);
        let state_path = root.path().join("backup-state.json");
        let src_gastos = root.path().join("lancamentos").join("gastos.csv");
        std::fs::write(&src_gastos, "DATA E HORA,VALOR\n01/01/24 08:00,\"R$ 4,00\"\n").unwrap();
        // A directory where the destination tab file should be makes the append fail.
        let dst_gastos = root.path().join("historico").join("GASTOS.csv");
        std::fs::remove_file(&dst_gastos).unwrap();
        std::fs::create_dir(&dst_gastos).unwrap();

        assert!(run_tracked_backup(&settings, root.path(), &state_path).is_err());
        assert_eq!(history(root.path()).len(), 3);
        assert!(state_path.exists());

        std::fs::remove_dir(&dst_gastos).unwrap();
        std::fs::write(&dst_gastos, "DATA E HORA,VALOR\n").unwrap();
        let reports = run_tracked_backup(&settings, root.path(), &state_path).unwrap();
        assert_eq!(reports[0].outcome, TabOutcome::NothingNew);
        assert_eq!(reports[1].outcome, TabOutcome::Copied(1));
        assert_eq!(history(root.path()).len(), 3);
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("backup-state.json");
        let mut state = BackupState::default();
        state.marks.insert(
            "a -> b".to_string(),
            HighWaterMark {
                rows: 3,
                fingerprint: fingerprint(&[vec!["x".to_string()]]),
            },
        );
        state.save(&path).unwrap();
        assert_eq!(BackupState::load(&path).unwrap(), state);
        assert_eq!(
            BackupState::load(&dir.path().join("missing.json")).unwrap(),
            BackupState::default()
        );
    }
}
