use std::io::Write as _;
use std::path::Path;

use crate::aggregate::{Period, PeriodSeries};
use crate::error::{LedgerError, Result};
use crate::fmt::{money, percent};
use crate::forecast::{ForecastInsight, ForecastResult};
use crate::metrics::{ProfitRow, ProfitTotals, SalesKpis, TrendInsight};

const BASE_CSS: &str = "\
body { font-family: Arial, sans-serif; margin: 20px; background-color: #f4f7f6; color: #333; }
.container { max-width: 1000px; margin: auto; background: white; padding: 25px; border-radius: 10px; box-shadow: 0 6px 15px rgba(0,0,0,0.1); }
h2 { color: var(--accent); border-bottom: 3px solid var(--accent); padding-bottom: 10px; }
.metric-box { padding: 20px; margin-bottom: 20px; border-radius: 8px; background-color: #f8f9fa; border-left: 6px solid var(--accent); font-size: 1.1em; }
.banner { padding: 20px; margin-bottom: 20px; border-radius: 8px; color: white; text-align: center; }
.banner p { font-size: 2.2em; font-weight: bold; margin: 0.3em 0; }
.info-box { padding: 10px; border: 1px dashed #ccc; background-color: #f8f9fa; margin-top: 15px; }
table { width: 100%; border-collapse: collapse; margin-top: 20px; }
th, td { padding: 10px; border: 1px solid #ddd; text-align: left; }
th { background-color: var(--accent); color: white; }
.positive { color: green; font-weight: bold; }
.negative { color: red; font-weight: bold; }
.neutral { color: #555; }
.profit-positive { background-color: #e6ffe6; }
.profit-negative { background-color: #ffe6e6; }
.bar { background-color: var(--accent); height: 14px; border-radius: 3px; }
.footer { margin-top: 20px; font-size: 0.9em; color: #777; }
";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, accent: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>\n:root {{ --accent: {accent}; }}\n{BASE_CSS}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n{body}</div>\n</body>\n</html>\n",
        title = escape(title),
    )
}

/// Week keys also show the Monday they start on.
fn period_label(period: &Period) -> String {
    match period {
        Period::Week { .. } => match period.start() {
            Some(start) => format!("{period} ({})", start.format("%d/%m")),
            None => period.to_string(),
        },
        Period::Month { .. } => period.to_string(),
    }
}

fn profit_class(net: f64) -> &'static str {
    if net >= 0.0 {
        "profit-positive"
    } else {
        "profit-negative"
    }
}

/// The change column shows N/A when there is no prior period or the prior
/// net profit was zero.
fn change_cell(row: &ProfitRow) -> String {
    match (row.pct_change, row.prior_net_profit) {
        (Some(pct), Some(prior)) if prior != 0.0 => {
            let class = if pct > 0.0 { "positive" } else { "negative" };
            format!("<span class=\"{class}\">{}</span>", percent(Some(pct)))
        }
        _ => "N/A".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Profit report (weekly / monthly)
// ---------------------------------------------------------------------------

pub struct ProfitReport<'a> {
    pub title: &'a str,
    pub scope: &'a str,
    pub rows: &'a [ProfitRow],
    pub totals: ProfitTotals,
    pub insight: TrendInsight,
    pub generated_at: &'a str,
}

pub fn render_profit_report(report: &ProfitReport) -> String {
    let mut body = String::new();
    body.push_str(&format!("<h2>{}</h2>\n", escape(report.title)));
    body.push_str(&format!(
        "<p>Scope: <strong>{}</strong>. Generated {}.</p>\n",
        escape(report.scope),
        escape(report.generated_at)
    ));
    body.push_str(&format!(
        "<div class=\"metric-box\">\
         <p>Total sales: <strong>{}</strong> ({} sales)</p>\
         <p>Total expenses: <strong>{}</strong></p>\
         <p>Net profit: <strong class=\"{}\">{}</strong></p>\
         <p>Latest trend: <span class=\"{}\">{}</span></p></div>\n",
        money(report.totals.sales),
        report.totals.sales_count,
        money(report.totals.expenses),
        if report.totals.net >= 0.0 { "positive" } else { "negative" },
        money(report.totals.net),
        report.insight.css_class(),
        escape(&report.insight.headline()),
    ));

    if report.rows.is_empty() {
        body.push_str("<p>No valid rows found for this period.</p>\n");
    } else {
        body.push_str(
            "<table>\n<thead><tr><th>Period</th><th>Sales</th><th>Expenses</th>\
             <th>Net profit</th><th>Change</th><th>Sales count</th></tr></thead>\n<tbody>\n",
        );
        for row in report.rows {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td></tr>\n",
                period_label(&row.period),
                money(row.sales_total),
                money(row.expense_total),
                profit_class(row.net_profit),
                money(row.net_profit),
                change_cell(row),
                row.sales_count,
            ));
        }
        body.push_str("</tbody>\n</table>\n");
    }
    page(report.title, "#008080", &body)
}

// ---------------------------------------------------------------------------
// Forecast dashboard
// ---------------------------------------------------------------------------

pub fn render_forecast(
    result: &ForecastResult,
    insight: &ForecastInsight,
    history: &[ProfitRow],
    generated_at: &str,
) -> String {
    let mut body = String::new();
    body.push_str("<h2>Net profit forecast</h2>\n");
    body.push_str(&format!(
        "<p>Model: simple linear regression over {} monthly periods. Generated {}.</p>\n",
        history.len(),
        escape(generated_at)
    ));
    body.push_str(&format!(
        "<div class=\"banner\" style=\"background-color: {};\">\
         <h3>Projected net profit for next month</h3><p>{}</p></div>\n",
        insight.color(),
        money(result.predicted_next)
    ));
    body.push_str(&format!(
        "<div class=\"info-box\"><h4>Forecast insight</h4><p>{}</p></div>\n",
        escape(&insight.headline())
    ));
    body.push_str(&format!(
        "<div class=\"info-box\"><h4>Model quality</h4>\
         <p>Last month's actual net profit: <strong>{}</strong></p>\
         <p>Historical mean absolute error (in-sample): <strong>{}</strong></p>\
         <p>Fitted line: {} + {} per month (next month is index {})</p></div>\n",
        money(result.last_actual),
        money(result.historical_mae),
        money(result.intercept),
        money(result.slope),
        result.next_index
    ));

    body.push_str("<h2>Audit table</h2>\n<p>Consolidated monthly sales and expenses the model was fitted on.</p>\n");
    body.push_str(
        "<table>\n<thead><tr><th>Month</th><th>Sales</th><th>Expenses</th>\
         <th>Net profit</th></tr></thead>\n<tbody>\n",
    );
    for row in history {
        body.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            profit_class(row.net_profit),
            row.period,
            money(row.sales_total),
            money(row.expense_total),
            money(row.net_profit),
        ));
    }
    body.push_str("</tbody>\n</table>\n");
    page("Net profit forecast", "#6f42c1", &body)
}

// ---------------------------------------------------------------------------
// Sales dashboard
// ---------------------------------------------------------------------------

pub fn render_sales_dashboard(kpis: &SalesKpis, monthly: &PeriodSeries, generated_at: &str) -> String {
    let mut body = String::new();
    body.push_str("<h2>Sales dashboard</h2>\n");
    body.push_str(&format!("<p>Generated {}.</p>\n", escape(generated_at)));

    let best_month = kpis
        .best_month
        .as_ref()
        .map(|b| format!("{} ({})", money(b.total), b.period))
        .unwrap_or_else(|| "N/A".to_string());
    let best_ticket = kpis
        .best_ticket
        .map(|(period, ticket)| format!("{} ({period})", money(ticket)))
        .unwrap_or_else(|| "N/A".to_string());
    let top_label = kpis
        .top_labels
        .first()
        .map(|l| format!("{} ({})", escape(&l.label), money(l.revenue)))
        .unwrap_or_else(|| "N/A".to_string());

    body.push_str("<table>\n<thead><tr><th>Metric</th><th>Value</th></tr></thead>\n<tbody>\n");
    for (metric, value) in [
        ("Total sales", money(kpis.grand_total)),
        ("Monthly average", money(kpis.monthly_mean)),
        ("Best month", best_month),
        ("Highest average ticket", best_ticket),
        ("Top product", top_label),
    ] {
        body.push_str(&format!("<tr><td>{metric}</td><td>{value}</td></tr>\n"));
    }
    body.push_str("</tbody>\n</table>\n");

    body.push_str("<h2>Monthly sales</h2>\n");
    let peak = monthly.iter().map(|b| b.total).fold(0.0_f64, f64::max);
    body.push_str(
        "<table>\n<thead><tr><th>Month</th><th>Total</th><th>Sales</th>\
         <th>Average ticket</th><th></th></tr></thead>\n<tbody>\n",
    );
    for bucket in monthly {
        let width = if peak > 0.0 {
            (bucket.total.max(0.0) / peak * 100.0).round()
        } else {
            0.0
        };
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td><div class=\"bar\" style=\"width: {width}%;\"></div></td></tr>\n",
            bucket.period,
            money(bucket.total),
            bucket.count,
            money(bucket.mean()),
        ));
    }
    body.push_str("</tbody>\n</table>\n");

    if !kpis.top_labels.is_empty() {
        body.push_str("<h2>Top products by revenue</h2>\n<table>\n<thead><tr><th>Product</th><th>Revenue</th></tr></thead>\n<tbody>\n");
        for label in &kpis.top_labels {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(&label.label),
                money(label.revenue)
            ));
        }
        body.push_str("</tbody>\n</table>\n");
    }
    page("Sales dashboard", "#ff8c00", &body)
}

// ---------------------------------------------------------------------------
// Error report and output
// ---------------------------------------------------------------------------

pub fn render_error(title: &str, detail: &str) -> String {
    let body = format!(
        "<h2>Critical error generating {}</h2>\n<p>Details: {}</p>\n",
        escape(title),
        escape(detail)
    );
    page(title, "#dc3545", &body)
}

/// Replace `path` with `html` in one step: readers see either the previous
/// report or the new one, never a partial file.
pub fn write_report(path: &Path, html: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(html.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| LedgerError::Io(e.error))?;
    tracing::info!(path = %path.display(), bytes = html.len(), "report written");
    Ok(())
}
