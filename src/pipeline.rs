use std::path::{Path, PathBuf};

use crate::aggregate::{aggregate, filter_month, Granularity};
use crate::credentials;
use crate::error::{LedgerError, Result};
use crate::forecast::{classify_forecast, forecast};
use crate::loader::load;
use crate::metrics::{
    classify_trend, compute_profit_with, sales_kpis, totals, ProfitRow, ZeroDivisorPolicy,
};
use crate::models::{CleanedRecord, RawTable, SourceSchema};
use crate::render::{self, ProfitReport};
use crate::settings::{shellexpand_path, ReportFiles, Settings, SheetSource};
use crate::sheets::{TabRef, Workbook};

/// One report the tool can produce. Each kind reads the configured sales and
/// expenses sources and writes a single HTML file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    WeeklyProfit { year: i32, month: u32 },
    MonthlyProfit,
    Forecast,
    SalesDashboard,
}

impl ReportKind {
    pub fn title(&self) -> String {
        match self {
            Self::WeeklyProfit { year, month } => format!("Weekly net profit {year}-{month:02}"),
            Self::MonthlyProfit => "Monthly net profit".to_string(),
            Self::Forecast => "Net profit forecast".to_string(),
            Self::SalesDashboard => "Sales dashboard".to_string(),
        }
    }

    pub fn file_name<'a>(&self, files: &'a ReportFiles) -> &'a str {
        match self {
            Self::WeeklyProfit { .. } => &files.weekly_profit,
            Self::MonthlyProfit => &files.monthly_profit,
            Self::Forecast => &files.forecast,
            Self::SalesDashboard => &files.sales_dashboard,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Raw tables of one run. Sales must be readable; expenses may be missing
/// and each report decides whether that is fatal.
pub struct SourceTables {
    pub sales: RawTable,
    pub expenses: Result<RawTable>,
}

impl SourceTables {
    pub fn read(settings: &Settings) -> Result<Self> {
        let workbook_dir = settings.workbook_dir();
        let sales = read_source(&workbook_dir, &settings.sales)?;
        let expenses = read_source(&workbook_dir, &settings.expenses);
        Ok(Self { sales, expenses })
    }
}

pub fn read_source(workbook_dir: &Path, source: &SheetSource) -> Result<RawTable> {
    let workbook = Workbook::open(workbook_dir, &source.spreadsheet_id)?;
    let rows = workbook.read_tab(&TabRef::parse(&source.tab))?;
    RawTable::from_rows(&source.schema.name, rows)
}

/// Records of a required source. A sheet with a header but nothing usable
/// under it is an error, not an empty report.
fn required_records(table: &RawTable, schema: &SourceSchema) -> Result<Vec<CleanedRecord>> {
    let records = load(table, schema)?.records;
    if records.is_empty() {
        return Err(LedgerError::NoValidRows(schema.name.clone()));
    }
    Ok(records)
}

/// Records of a secondary source. An unavailable or empty source becomes no
/// records so the profit falls back to sales alone.
fn secondary_records(table: Result<RawTable>, schema: &SourceSchema) -> Result<Vec<CleanedRecord>> {
    match table.and_then(|t| load(&t, schema)) {
        Ok(outcome) if outcome.records.is_empty() => {
            tracing::warn!(source = %schema.name, "no valid rows; treating as zero");
            Ok(Vec::new())
        }
        Ok(outcome) => Ok(outcome.records),
        Err(e) if e.is_source_unavailable() => {
            tracing::warn!(source = %schema.name, error = %e, "source unavailable; treating as zero");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

fn profit_rows_from(
    sales: &[CleanedRecord],
    expenses: &[CleanedRecord],
    granularity: Granularity,
    policy: ZeroDivisorPolicy,
) -> Vec<ProfitRow> {
    compute_profit_with(
        &aggregate(sales, granularity),
        &aggregate(expenses, granularity),
        policy,
    )
}

/// Profit rows with the secondary-source fallback, optionally restricted to
/// one calendar month.
pub fn profit_rows(
    tables: SourceTables,
    settings: &Settings,
    granularity: Granularity,
    month: Option<(i32, u32)>,
) -> Result<Vec<ProfitRow>> {
    let mut sales = required_records(&tables.sales, &settings.sales.schema)?;
    let mut expenses = secondary_records(tables.expenses, &settings.expenses.schema)?;
    if let Some((year, m)) = month {
        sales = filter_month(&sales, year, m);
        expenses = filter_month(&expenses, year, m);
    }
    Ok(profit_rows_from(&sales, &expenses, granularity, settings.zero_divisor))
}

/// Build the HTML of one report from already-read tables.
pub fn build_report(
    kind: ReportKind,
    tables: SourceTables,
    settings: &Settings,
    generated_at: &str,
) -> Result<String> {
    let title = kind.title();
    match kind {
        ReportKind::WeeklyProfit { year, month } => {
            let rows = profit_rows(tables, settings, Granularity::Week, Some((year, month)))?;
            let scope = format!("{year}-{month:02}");
            Ok(render::render_profit_report(&ProfitReport {
                title: &title,
                scope: &scope,
                rows: &rows,
                totals: totals(&rows),
                insight: classify_trend(&rows),
                generated_at,
            }))
        }
        ReportKind::MonthlyProfit => {
            let rows = profit_rows(tables, settings, Granularity::Month, None)?;
            Ok(render::render_profit_report(&ProfitReport {
                title: &title,
                scope: "all months",
                rows: &rows,
                totals: totals(&rows),
                insight: classify_trend(&rows),
                generated_at,
            }))
        }
        ReportKind::Forecast => {
            let sales = required_records(&tables.sales, &settings.sales.schema)?;
            let expenses = required_records(&tables.expenses?, &settings.expenses.schema)?;
            let rows =
                profit_rows_from(&sales, &expenses, Granularity::Month, settings.zero_divisor);
            let result = forecast(&rows)?;
            let insight = classify_forecast(&result);
            Ok(render::render_forecast(&result, &insight, &rows, generated_at))
        }
        ReportKind::SalesDashboard => {
            let sales = required_records(&tables.sales, &settings.sales.schema)?;
            let monthly = aggregate(&sales, Granularity::Month);
            let kpis = sales_kpis(&sales, &monthly);
            Ok(render::render_sales_dashboard(&kpis, &monthly, generated_at))
        }
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Credentials are checked before any data access.
fn authorize(settings: &Settings) -> Result<()> {
    let credentials_file = PathBuf::from(shellexpand_path(&settings.credentials_file));
    let creds = credentials::resolve(&credentials_file)?;
    tracing::debug!(origin = %creds.origin, account = %creds.account.client_email, "authorized");
    Ok(())
}

fn generate(kind: ReportKind, settings: &Settings, generated_at: &str) -> Result<String> {
    authorize(settings)?;
    let tables = SourceTables::read(settings)?;
    build_report(kind, tables, settings, generated_at)
}

/// Produce one report at `output` (or its configured location). On failure
/// an error report takes its place and the error is returned.
pub fn run_report(kind: ReportKind, settings: &Settings, output: Option<PathBuf>) -> Result<PathBuf> {
    let path = output.unwrap_or_else(|| settings.output_path(kind.file_name(&settings.reports)));
    let generated_at = chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string();

    match generate(kind, settings, &generated_at) {
        Ok(html) => {
            render::write_report(&path, &html)?;
            Ok(path)
        }
        Err(e) => {
            tracing::error!(report = %kind.title(), error = %e, "report failed");
            let html = render::render_error(&kind.title(), &e.to_string());
            if let Err(write_err) = render::write_report(&path, &html) {
                tracing::error!(path = %path.display(), error = %write_err, "could not write error report");
            }
            Err(e)
        }
    }
}

/// Rows for the terminal summary, read the same way the profit reports read
/// them.
pub fn summary_rows(settings: &Settings, granularity: Granularity) -> Result<Vec<ProfitRow>> {
    authorize(settings)?;
    let tables = SourceTables::read(settings)?;
    profit_rows(tables, settings, granularity, None)
}

/// Parse a `YYYY-MM` month argument.
pub fn parse_month(raw: &str) -> Result<(i32, u32)> {
    let invalid = || LedgerError::Other(format!("invalid month '{raw}', expected YYYY-MM"));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Period;

    fn table(name: &str, rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(
            name,
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    fn sales_table() -> RawTable {
        table(
            "sales",
            &[
                &["DATA E HORA", "VALOR DA VENDA", "SABORES"],
                &["01/01/24", "R$ 10,00", "Chocolate"],
                &["15/01/24", "R$ 20,00", "Morango"],
                &["01/02/24", "R$ 5,00", "Chocolate"],
            ],
        )
    }

    fn expenses_table() -> RawTable {
        table(
            "expenses",
            &[
                &["DATA E HORA", "VALOR"],
                &["10/01/24", "R$ 8,00"],
                &["10/03/24", "R$ 2,00"],
            ],
        )
    }

    fn month(m: u32) -> Period {
        Period::Month { year: 2024, month: m }
    }

    #[test]
    fn test_end_to_end_monthly_aggregation() {
        let raw = table(
            "expenses",
            &[
                &["DATA E HORA", "VALOR"],
                &["01/01/24", "R$ 10,00"],
                &["15/01/24", "R$ 20,00"],
                &["01/02/24", "R$ 5,00"],
            ],
        );
        let schema = SourceSchema::new("expenses", "DATA E HORA", "VALOR");
        let records = load(&raw, &schema).unwrap().records;
        let series = aggregate(&records, Granularity::Month);
        let got: Vec<(Period, f64)> = series.iter().map(|b| (b.period, b.total)).collect();
        assert_eq!(got, vec![(month(1), 30.0), (month(2), 5.0)]);
    }

    #[test]
    fn test_profit_rows_outer_join() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Ok(expenses_table()),
        };
        let rows = profit_rows(tables, &Settings::default(), Granularity::Month, None).unwrap();
        let nets: Vec<(Period, f64)> = rows.iter().map(|r| (r.period, r.net_profit)).collect();
        assert_eq!(nets, vec![(month(1), 22.0), (month(2), 5.0), (month(3), -2.0)]);
    }

    #[test]
    fn test_missing_expenses_tab_is_downgraded() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Err(LedgerError::SheetNotFound {
                spreadsheet: "historico".into(),
                tab: "GASTOS".into(),
            }),
        };
        let rows = profit_rows(tables, &Settings::default(), Granularity::Month, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.expense_total == 0.0));
    }

    #[test]
    fn test_expenses_schema_error_is_downgraded() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Ok(table("expenses", &[&["DATA E HORA", "CUSTO"], &["10/01/24", "1"]])),
        };
        let rows = profit_rows(tables, &Settings::default(), Granularity::Month, None).unwrap();
        assert_eq!(rows[0].net_profit, 30.0);
    }

    #[test]
    fn test_sales_schema_error_is_fatal() {
        let tables = SourceTables {
            sales: table("sales", &[&["DATA E HORA", "VALOR"], &["01/01/24", "1"]]),
            expenses: Ok(expenses_table()),
        };
        let err = profit_rows(tables, &Settings::default(), Granularity::Month, None).unwrap_err();
        match err {
            LedgerError::Schema { missing, .. } => assert_eq!(missing, vec!["VALOR DA VENDA"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sales_without_valid_rows_is_fatal() {
        let tables = SourceTables {
            sales: table("sales", &[&["DATA E HORA", "VALOR DA VENDA"], &["xx", "yy"]]),
            expenses: Ok(expenses_table()),
        };
        let err = profit_rows(tables, &Settings::default(), Granularity::Month, None).unwrap_err();
        assert!(matches!(err, LedgerError::NoValidRows(ref name) if name == "sales"));
    }

    #[test]
    fn test_forecast_requires_valid_expense_rows() {
        let months = ["01", "02", "03", "04"];
        let mut sales: Vec<Vec<String>> = vec![vec!["DATA E HORA".into(), "VALOR DA VENDA".into()]];
        for m in months {
            sales.push(vec![format!("05/{m}/2024"), "R$ 100,00".into()]);
        }
        let tables = SourceTables {
            sales: RawTable::from_rows("sales", sales).unwrap(),
            expenses: Ok(table("expenses", &[&["DATA E HORA", "VALOR"], &["??", "R$ 1,00"]])),
        };
        let err = build_report(ReportKind::Forecast, tables, &Settings::default(), "now").unwrap_err();
        assert!(matches!(err, LedgerError::NoValidRows(ref name) if name == "expenses"));
    }

    #[test]
    fn test_badly_encoded_cell_drops_only_its_row() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("historico");
        std::fs::create_dir_all(&book).unwrap();
        std::fs::write(
            book.join("GASTOS.csv"),
            b"DATA E HORA,VALOR\n10/01/24,\"R$ 8,00\"\n11/01/24,R$ \xff\n".to_vec(),
        )
        .unwrap();
        let settings = Settings::default();
        let raw = read_source(dir.path(), &settings.expenses).unwrap();
        let outcome = load(&raw, &settings.expenses.schema).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.stats.bad_amount, 1);
    }

    #[test]
    fn test_weekly_report_is_filtered_to_month() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Ok(expenses_table()),
        };
        let kind = ReportKind::WeeklyProfit { year: 2024, month: 1 };
        let html = build_report(kind, tables, &Settings::default(), "now").unwrap();
        assert!(html.contains("2024-W01"));
        assert!(html.contains("2024-W03"));
        assert!(!html.contains("2024-W05"));
    }

    #[test]
    fn test_forecast_requires_expenses() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Err(LedgerError::SheetNotFound {
                spreadsheet: "historico".into(),
                tab: "GASTOS".into(),
            }),
        };
        let err = build_report(ReportKind::Forecast, tables, &Settings::default(), "now").unwrap_err();
        assert!(matches!(err, LedgerError::SheetNotFound { .. }));
    }

    #[test]
    fn test_forecast_with_short_history_fails() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Ok(expenses_table()),
        };
        let err = build_report(ReportKind::Forecast, tables, &Settings::default(), "now").unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientData { needed: 4, found: 3 }));
    }

    #[test]
    fn test_sales_dashboard_ignores_expenses() {
        let tables = SourceTables {
            sales: sales_table(),
            expenses: Err(LedgerError::Other("unreadable".into())),
        };
        let html = build_report(ReportKind::SalesDashboard, tables, &Settings::default(), "now").unwrap();
        assert!(html.contains("R$ 35,00"));
        assert!(html.contains("Chocolate"));
    }

    #[test]
    fn test_run_report_without_credentials_writes_error_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.credentials_file = dir.path().join("missing.json").to_string_lossy().to_string();
        settings.workbook_dir = dir.path().to_string_lossy().to_string();
        let out = dir.path().join("report.html");
        if credentials::CREDENTIAL_ENV_VARS
            .iter()
            .any(|v| std::env::var(v).map_or(false, |s| !s.trim().is_empty()))
        {
            return;
        }
        let err = run_report(ReportKind::MonthlyProfit, &settings, Some(out.clone())).unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
        let html = std::fs::read_to_string(&out).unwrap();
        assert!(html.contains("Critical error generating Monthly net profit"));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-03").unwrap(), (2024, 3));
        assert!(parse_month("2024-13").is_err());
        assert!(parse_month("03/2024").is_err());
    }

    #[test]
    fn test_file_names_follow_settings() {
        let files = ReportFiles::default();
        assert_eq!(ReportKind::Forecast.file_name(&files), "dashboard_ml_insights.html");
        assert_eq!(
            ReportKind::WeeklyProfit { year: 2024, month: 1 }.file_name(&files),
            "dashboard_lucro_semanal.html"
        );
    }
}
