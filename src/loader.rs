use crate::error::{LedgerError, Result};
use crate::models::{CleanedRecord, RawTable, SourceSchema};
use crate::parse::{parse_amount, parse_datetime};

/// Header positions of the schema's columns, resolved once per sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedColumns {
    pub date: usize,
    pub amount: usize,
    pub label: Option<usize>,
}

impl SourceSchema {
    pub fn new(name: &str, date_column: &str, amount_column: &str) -> Self {
        Self {
            name: name.to_string(),
            date_column: date_column.to_string(),
            amount_column: amount_column.to_string(),
            label_column: None,
        }
    }

    pub fn with_label(mut self, label_column: &str) -> Self {
        self.label_column = Some(label_column.to_string());
        self
    }

    /// Match required columns against the header, exact and case-sensitive.
    /// Every missing required column is reported at once.
    pub fn resolve(&self, header: &[String]) -> Result<ResolvedColumns> {
        let position = |name: &str| header.iter().position(|h| h == name);
        let date = position(&self.date_column);
        let amount = position(&self.amount_column);

        let mut missing = Vec::new();
        if date.is_none() {
            missing.push(self.date_column.clone());
        }
        if amount.is_none() {
            missing.push(self.amount_column.clone());
        }
        let (Some(date), Some(amount)) = (date, amount) else {
            return Err(LedgerError::Schema {
                source_name: self.name.clone(),
                missing,
            });
        };

        let label = match &self.label_column {
            Some(col) => {
                let idx = position(col);
                if idx.is_none() {
                    tracing::warn!(
                        source = %self.name,
                        column = %col,
                        "optional label column not found; label breakdown unavailable"
                    );
                }
                idx
            }
            None => None,
        };

        Ok(ResolvedColumns { date, amount, label })
    }
}

/// Row counts from one load, kept for operators chasing formatting drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub input_rows: usize,
    pub parsed_rows: usize,
    pub bad_date: usize,
    pub bad_amount: usize,
    pub bad_both: usize,
}

impl LoadStats {
    pub fn dropped(&self) -> usize {
        self.bad_date + self.bad_amount + self.bad_both
    }
}

pub struct LoadOutcome {
    pub records: Vec<CleanedRecord>,
    pub stats: LoadStats,
}

pub fn load(table: &RawTable, schema: &SourceSchema) -> Result<LoadOutcome> {
    let cols = schema.resolve(&table.header)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut stats = LoadStats {
        input_rows: table.rows.len(),
        ..LoadStats::default()
    };

    for row in &table.rows {
        let timestamp = parse_datetime(RawTable::cell(row, cols.date));
        let amount = parse_amount(RawTable::cell(row, cols.amount));
        match (timestamp, amount) {
            (Some(timestamp), Some(amount)) => {
                let label = cols
                    .label
                    .map(|idx| RawTable::cell(row, idx).trim())
                    .filter(|l| !l.is_empty())
                    .map(str::to_string);
                records.push(CleanedRecord {
                    timestamp,
                    amount,
                    label,
                });
                stats.parsed_rows += 1;
            }
            (None, Some(_)) => stats.bad_date += 1,
            (Some(_), None) => stats.bad_amount += 1,
            (None, None) => stats.bad_both += 1,
        }
    }

    tracing::info!(
        source = %schema.name,
        input_rows = stats.input_rows,
        parsed_rows = stats.parsed_rows,
        bad_date = stats.bad_date,
        bad_amount = stats.bad_amount,
        bad_both = stats.bad_both,
        "loaded ledger rows"
    );
    if stats.dropped() > 0 {
        tracing::warn!(source = %schema.name, dropped = stats.dropped(), "rows dropped during cleaning");
    }

    Ok(LoadOutcome { records, stats })
}
