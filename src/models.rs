use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Text cells of one sheet: the header row plus every data row after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Split the first row off as the header. A sheet without any row has no
    /// header to resolve columns against.
    pub fn from_rows(source_name: &str, mut rows: Vec<Vec<String>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(LedgerError::Schema {
                source_name: source_name.to_string(),
                missing: vec!["<header row>".to_string()],
            });
        }
        let header = rows.remove(0);
        Ok(Self { header, rows })
    }

    /// Cell text, or an empty string when the row is shorter than the header.
    pub fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// A ledger row whose date and amount both parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub label: Option<String>,
}

/// Column names a source is expected to carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub name: String,
    pub date_column: String,
    pub amount_column: String,
    #[serde(default)]
    pub label_column: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_from_rows_splits_header() {
        let table = RawTable::from_rows(
            "sales",
            vec![row(&["DATA E HORA", "VALOR"]), row(&["01/01/24", "R$ 1,00"])],
        )
        .unwrap();
        assert_eq!(table.header, row(&["DATA E HORA", "VALOR"]));
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_from_rows_rejects_empty_sheet() {
        let err = RawTable::from_rows("expenses", vec![]).unwrap_err();
        assert!(matches!(err, LedgerError::Schema { .. }));
    }

    #[test]
    fn test_cell_pads_short_rows() {
        let r = row(&["a"]);
        assert_eq!(RawTable::cell(&r, 0), "a");
        assert_eq!(RawTable::cell(&r, 3), "");
    }
}
