use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};

/// Tab reference: by exact name, or by zero-based position written `#0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabRef {
    Name(String),
    Index(usize),
}

impl TabRef {
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix('#')
            .and_then(|rest| rest.parse().ok())
            .map(TabRef::Index)
            .unwrap_or_else(|| TabRef::Name(raw.to_string()))
    }
}

impl fmt::Display for TabRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabRef::Name(name) => f.write_str(name),
            TabRef::Index(idx) => write!(f, "#{idx}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Workbook kinds
// ---------------------------------------------------------------------------

/// A spreadsheet stored under the workbook directory, addressed by its id.
///
/// - `<root>/<id>/` holds one `<tab>.csv` per tab; tab order is file-name order.
/// - `<root>/<id>.xlsx` is read-only.
#[derive(Debug, Clone)]
pub enum Workbook {
    CsvDir { id: String, dir: PathBuf },
    #[cfg(feature = "xlsx")]
    Xlsx { id: String, path: PathBuf },
}

impl Workbook {
    pub fn open(root: &Path, spreadsheet_id: &str) -> Result<Self> {
        let dir = root.join(spreadsheet_id);
        if dir.is_dir() {
            return Ok(Self::CsvDir {
                id: spreadsheet_id.to_string(),
                dir,
            });
        }
        #[cfg(feature = "xlsx")]
        {
            let path = root.join(format!("{spreadsheet_id}.xlsx"));
            if path.is_file() {
                return Ok(Self::Xlsx {
                    id: spreadsheet_id.to_string(),
                    path,
                });
            }
        }
        Err(LedgerError::SpreadsheetNotFound(format!(
            "'{spreadsheet_id}' under {}",
            root.display()
        )))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::CsvDir { id, .. } => id,
            #[cfg(feature = "xlsx")]
            Self::Xlsx { id, .. } => id,
        }
    }

    pub fn tab_names(&self) -> Result<Vec<String>> {
        match self {
            Self::CsvDir { dir, .. } => csv_tab_names(dir),
            #[cfg(feature = "xlsx")]
            Self::Xlsx { path, .. } => xlsx_tab_names(path),
        }
    }

    /// Every row of the tab, header included, as entered.
    pub fn read_tab(&self, tab: &TabRef) -> Result<Vec<Vec<String>>> {
        let name = self.resolve_tab(tab)?;
        let rows = match self {
            Self::CsvDir { dir, .. } => read_csv_tab(&dir.join(format!("{name}.csv")))?,
            #[cfg(feature = "xlsx")]
            Self::Xlsx { path, .. } => read_xlsx_tab(path, &name)?,
        };
        tracing::debug!(spreadsheet = %self.id(), tab = %name, rows = rows.len(), "read tab");
        Ok(rows)
    }

    /// Append rows after the last filled row, cell text untouched.
    pub fn append_rows(&self, tab: &TabRef, rows: &[Vec<String>]) -> Result<usize> {
        let name = self.resolve_tab(tab)?;
        match self {
            Self::CsvDir { dir, .. } => append_csv_rows(&dir.join(format!("{name}.csv")), rows),
            #[cfg(feature = "xlsx")]
            Self::Xlsx { .. } => Err(LedgerError::Workbook(format!(
                "spreadsheet '{}' is an xlsx file and cannot be appended to",
                self.id()
            ))),
        }
    }

    fn resolve_tab(&self, tab: &TabRef) -> Result<String> {
        let names = self.tab_names()?;
        let found = match tab {
            TabRef::Name(name) => names.iter().find(|n| *n == name).cloned(),
            TabRef::Index(idx) => names.get(*idx).cloned(),
        };
        found.ok_or_else(|| LedgerError::SheetNotFound {
            spreadsheet: self.id().to_string(),
            tab: tab.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// CSV directory
// ---------------------------------------------------------------------------

fn csv_tab_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn read_csv_tab(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    // A badly encoded cell only spoils its own row: it fails to parse later
    // and is counted as dropped.
    let mut rows = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect(),
        );
    }
    Ok(rows)
}

fn append_csv_rows(path: &Path, rows: &[Vec<String>]) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)?;

    // A last line without a newline would swallow the first appended row.
    let len = file.metadata()?.len();
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file);
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

// ---------------------------------------------------------------------------
// XLSX (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_text(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = base + chrono::Duration::seconds(seconds);
    dt.format("%d/%m/%Y %H:%M:%S").to_string()
}

#[cfg(feature = "xlsx")]
fn xlsx_tab_names(path: &Path) -> Result<Vec<String>> {
    use calamine::Reader;
    let workbook = calamine::open_workbook_auto(path)
        .map_err(|e| LedgerError::Workbook(format!("Failed to open XLSX: {e}")))?;
    Ok(workbook.sheet_names().to_vec())
}

#[cfg(feature = "xlsx")]
fn read_xlsx_tab(path: &Path, name: &str) -> Result<Vec<Vec<String>>> {
    use calamine::{Data, DataType, Reader};

    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| LedgerError::Workbook(format!("Failed to open XLSX: {e}")))?;
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| LedgerError::Workbook(format!("Failed to read tab '{name}': {e}")))?;

    let rows = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Data::String(s) => s.clone(),
                    // Numbers are rendered with a decimal comma, as typed in the sheet.
                    Data::Float(f) => f.to_string().replace('.', ","),
                    Data::Int(i) => i.to_string(),
                    Data::Bool(b) => b.to_string(),
                    Data::DateTime(_) => cell.as_f64().map(excel_serial_to_text).unwrap_or_default(),
                    Data::DateTimeIso(s) => s.clone(),
                    _ => String::new(),
                })
                .collect::<Vec<String>>()
        })
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();
    Ok(rows)
}
