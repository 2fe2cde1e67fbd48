use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing column(s) in '{source_name}': {}", .missing.join(", "))]
    Schema {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("Insufficient data: {found} period(s) available, at least {needed} required")]
    InsufficientData { needed: usize, found: usize },

    #[error("No valid rows in '{0}'")]
    NoValidRows(String),

    #[error("Spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    #[error("Sheet not found: tab '{tab}' in spreadsheet '{spreadsheet}'")]
    SheetNotFound { spreadsheet: String, tab: String },

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl LedgerError {
    /// Failures that let a secondary source fall back to an empty series.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::SheetNotFound { .. } | Self::SpreadsheetNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
