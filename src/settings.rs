use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::metrics::ZeroDivisorPolicy;
use crate::models::SourceSchema;

const DATE_COLUMN: &str = "DATA E HORA";

/// A tab in a workbook, plus the columns expected in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSource {
    pub spreadsheet_id: String,
    pub tab: String,
    pub schema: SourceSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabMapping {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub source_spreadsheet: String,
    pub destination_spreadsheet: String,
    pub tabs: Vec<TabMapping>,
    pub state_file: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            source_spreadsheet: "lancamentos".to_string(),
            destination_spreadsheet: "historico".to_string(),
            tabs: vec![
                TabMapping {
                    source: "vendas".to_string(),
                    destination: "VENDAS".to_string(),
                },
                TabMapping {
                    source: "gastos".to_string(),
                    destination: "GASTOS".to_string(),
                },
            ],
            state_file: "backup-state.json".to_string(),
        }
    }
}

/// Fixed output file name per report kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportFiles {
    pub weekly_profit: String,
    pub monthly_profit: String,
    pub forecast: String,
    pub sales_dashboard: String,
}

impl Default for ReportFiles {
    fn default() -> Self {
        Self {
            weekly_profit: "dashboard_lucro_semanal.html".to_string(),
            monthly_profit: "dashboard_lucro_mensal.html".to_string(),
            forecast: "dashboard_ml_insights.html".to_string(),
            sales_dashboard: "dashboard_vendas_final.html".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub workbook_dir: String,
    pub output_dir: String,
    pub credentials_file: String,
    pub zero_divisor: ZeroDivisorPolicy,
    pub sales: SheetSource,
    pub expenses: SheetSource,
    pub backup: BackupSettings,
    pub reports: ReportFiles,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workbook_dir: default_workbook_dir().to_string_lossy().to_string(),
            output_dir: ".".to_string(),
            credentials_file: "credentials.json".to_string(),
            zero_divisor: ZeroDivisorPolicy::default(),
            sales: SheetSource {
                spreadsheet_id: "historico".to_string(),
                tab: "VENDAS".to_string(),
                schema: SourceSchema::new("sales", DATE_COLUMN, "VALOR DA VENDA")
                    .with_label("SABORES"),
            },
            expenses: SheetSource {
                spreadsheet_id: "historico".to_string(),
                tab: "GASTOS".to_string(),
                schema: SourceSchema::new("expenses", DATE_COLUMN, "VALOR"),
            },
            backup: BackupSettings::default(),
            reports: ReportFiles::default(),
        }
    }
}

impl Settings {
    pub fn workbook_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.workbook_dir))
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.output_dir)).join(file_name)
    }

    pub fn backup_state_path(&self) -> PathBuf {
        self.workbook_dir().join(&self.backup.state_file)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ledgerdash")
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_workbook_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("ledgerdash")
        .join("workbooks")
}

/// Load settings from `path` (or the default location). A missing file means
/// defaults; a malformed one is a configuration error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_settings_path);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    serde_json::from_str(&content).map_err(|e| {
        LedgerError::Configuration(format!("invalid settings file {}: {e}", path.display()))
    })
}

pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
