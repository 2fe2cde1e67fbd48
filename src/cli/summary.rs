use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregate::Granularity;
use crate::cli::settings_for;
use crate::error::Result;
use crate::fmt::{money, percent};
use crate::metrics::{classify_trend, totals, ProfitRow, TrendInsight};
use crate::pipeline::summary_rows;

pub fn run(config: Option<&PathBuf>, granularity: Granularity) -> Result<()> {
    let settings = settings_for(config)?;
    let rows = summary_rows(&settings, granularity)?;
    println!("{}", format_summary(&rows));
    Ok(())
}

fn colored_money(val: f64) -> String {
    if val >= 0.0 {
        money(val).green().to_string()
    } else {
        money(val).red().to_string()
    }
}

pub fn format_summary(rows: &[ProfitRow]) -> String {
    if rows.is_empty() {
        return "No valid rows found.".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec!["Period", "Sales", "Expenses", "Net", "Change", "Sales #"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.period.to_string()),
            Cell::new(money(row.sales_total)),
            Cell::new(money(row.expense_total)),
            Cell::new(colored_money(row.net_profit)),
            Cell::new(percent(row.pct_change)),
            Cell::new(row.sales_count),
        ]);
    }
    let t = totals(rows);
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(t.sales)),
        Cell::new(money(t.expenses)),
        Cell::new(colored_money(t.net)),
        Cell::new(""),
        Cell::new(t.sales_count),
    ]);

    let insight = classify_trend(rows);
    let headline = match insight {
        TrendInsight::InsufficientHistory => insight.headline().normal(),
        TrendInsight::Loss { .. } | TrendInsight::Decline { .. } => insight.headline().red(),
        TrendInsight::StrongGrowth { .. } | TrendInsight::ModerateGrowth { .. } => {
            insight.headline().green()
        }
    };
    format!("{table}\n{headline}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Period, PeriodBucket};
    use crate::metrics::compute_profit;

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let sales = vec![
            PeriodBucket {
                period: Period::Month { year: 2024, month: 1 },
                total: 100.0,
                count: 3,
            },
            PeriodBucket {
                period: Period::Month { year: 2024, month: 2 },
                total: 150.0,
                count: 4,
            },
        ];
        let rows = compute_profit(&sales, &vec![]);
        let out = format_summary(&rows);
        assert!(out.contains("2024-01"));
        assert!(out.contains("R$ 250,00"));
        assert!(out.contains("50.00%"));
        assert!(out.contains("Strong profit growth"));
    }

    #[test]
    fn test_format_summary_empty() {
        assert_eq!(format_summary(&[]), "No valid rows found.");
    }
}
