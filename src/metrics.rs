use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::aggregate::{Period, PeriodBucket, PeriodSeries};
use crate::fmt::money;
use crate::models::CleanedRecord;

const STRONG_GROWTH_PCT: f64 = 15.0;
const TOP_LABELS: usize = 5;

/// What to do with period-over-period change when the prior net profit is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDivisorPolicy {
    /// Divide by 1 instead. Avoids the division by zero but the percentage
    /// is not meaningful.
    #[default]
    SubstituteOne,
    /// Leave the change undefined.
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitRow {
    pub period: Period,
    pub sales_total: f64,
    pub expense_total: f64,
    pub net_profit: f64,
    pub prior_net_profit: Option<f64>,
    pub pct_change: Option<f64>,
    pub sales_count: usize,
}

pub fn compute_profit(sales: &PeriodSeries, expenses: &PeriodSeries) -> Vec<ProfitRow> {
    compute_profit_with(sales, expenses, ZeroDivisorPolicy::default())
}

/// Outer-join both series by period (a side without the period counts as 0)
/// and derive net profit and change against the previous row.
pub fn compute_profit_with(
    sales: &PeriodSeries,
    expenses: &PeriodSeries,
    policy: ZeroDivisorPolicy,
) -> Vec<ProfitRow> {
    let mut joined: BTreeMap<Period, (f64, f64, usize)> = BTreeMap::new();
    for bucket in sales {
        let entry = joined.entry(bucket.period).or_default();
        entry.0 += bucket.total;
        entry.2 += bucket.count;
    }
    for bucket in expenses {
        joined.entry(bucket.period).or_default().1 += bucket.total;
    }

    let mut rows: Vec<ProfitRow> = Vec::with_capacity(joined.len());
    for (period, (sales_total, expense_total, sales_count)) in joined {
        let net_profit = sales_total - expense_total;
        let prior_net_profit = rows.last().map(|r| r.net_profit);
        let pct_change = prior_net_profit.and_then(|prior| pct_change(net_profit, prior, policy));
        rows.push(ProfitRow {
            period,
            sales_total,
            expense_total,
            net_profit,
            prior_net_profit,
            pct_change,
            sales_count,
        });
    }
    rows
}

fn pct_change(current: f64, prior: f64, policy: ZeroDivisorPolicy) -> Option<f64> {
    let divisor = if prior == 0.0 {
        match policy {
            ZeroDivisorPolicy::SubstituteOne => 1.0,
            ZeroDivisorPolicy::Undefined => return None,
        }
    } else {
        prior
    };
    Some((current - prior) / divisor * 100.0)
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendInsight {
    InsufficientHistory,
    Loss { net_profit: f64 },
    StrongGrowth { pct: f64 },
    ModerateGrowth { pct: f64 },
    Decline { pct: f64 },
}

impl TrendInsight {
    pub fn headline(&self) -> String {
        match *self {
            Self::InsufficientHistory => {
                "Not enough history yet: period-over-period trend unavailable.".to_string()
            }
            Self::Loss { net_profit } => format!(
                "Loss of {} in the latest period.",
                money(net_profit.abs())
            ),
            Self::StrongGrowth { pct } => {
                format!("Strong profit growth: up {pct:.2}% on the previous period.")
            }
            Self::ModerateGrowth { pct } => {
                format!("Moderate profit growth of {pct:.2}%.")
            }
            Self::Decline { pct } => format!("Profit declined {:.2}%.", pct.abs()),
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::InsufficientHistory => "neutral",
            Self::Loss { .. } | Self::Decline { .. } => "negative",
            Self::StrongGrowth { .. } | Self::ModerateGrowth { .. } => "positive",
        }
    }
}

/// Classify the latest row. A row without a computable change (the first
/// period, or an undefined change) has no trend regardless of its sign.
pub fn classify_trend(rows: &[ProfitRow]) -> TrendInsight {
    let Some(latest) = rows.last() else {
        return TrendInsight::InsufficientHistory;
    };
    let Some(pct) = latest.pct_change else {
        return TrendInsight::InsufficientHistory;
    };
    if latest.net_profit < 0.0 {
        TrendInsight::Loss {
            net_profit: latest.net_profit,
        }
    } else if pct > STRONG_GROWTH_PCT {
        TrendInsight::StrongGrowth { pct }
    } else if pct > 0.0 {
        TrendInsight::ModerateGrowth { pct }
    } else {
        TrendInsight::Decline { pct }
    }
}

// ---------------------------------------------------------------------------
// Totals and sales KPIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfitTotals {
    pub sales: f64,
    pub expenses: f64,
    pub net: f64,
    pub sales_count: usize,
}

pub fn totals(rows: &[ProfitRow]) -> ProfitTotals {
    rows.iter().fold(ProfitTotals::default(), |acc, r| ProfitTotals {
        sales: acc.sales + r.sales_total,
        expenses: acc.expenses + r.expense_total,
        net: acc.net + r.net_profit,
        sales_count: acc.sales_count + r.sales_count,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRevenue {
    pub label: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesKpis {
    pub grand_total: f64,
    pub monthly_mean: f64,
    pub best_month: Option<PeriodBucket>,
    pub best_ticket: Option<(Period, f64)>,
    pub top_labels: Vec<LabelRevenue>,
}

/// Headline figures of the sales dashboard, from the monthly sales series
/// and the records it was built from.
pub fn sales_kpis(records: &[CleanedRecord], monthly: &PeriodSeries) -> SalesKpis {
    let grand_total: f64 = monthly.iter().map(|b| b.total).sum();
    let monthly_mean = if monthly.is_empty() {
        0.0
    } else {
        grand_total / monthly.len() as f64
    };

    // First maximum wins on ties, in chronological order.
    let best_month = monthly
        .iter()
        .fold(None::<&PeriodBucket>, |best, b| match best {
            Some(cur) if cur.total >= b.total => Some(cur),
            _ => Some(b),
        })
        .cloned();
    let best_ticket = monthly
        .iter()
        .map(|b| (b.period, b.mean()))
        .fold(None::<(Period, f64)>, |best, cand| match best {
            Some(cur) if cur.1 >= cand.1 => Some(cur),
            _ => Some(cand),
        });

    let mut by_label: HashMap<&str, f64> = HashMap::new();
    for r in records {
        if let Some(label) = &r.label {
            *by_label.entry(label.as_str()).or_default() += r.amount;
        }
    }
    let mut top_labels: Vec<LabelRevenue> = by_label
        .into_iter()
        .map(|(label, revenue)| LabelRevenue {
            label: label.to_string(),
            revenue,
        })
        .collect();
    top_labels.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.label.cmp(&b.label))
    });
    top_labels.truncate(TOP_LABELS);

    SalesKpis {
        grand_total,
        monthly_mean,
        best_month,
        best_ticket,
        top_labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Granularity};
    use crate::parse::parse_datetime;

    fn month(m: u32) -> Period {
        Period::Month { year: 2024, month: m }
    }

    fn bucket(m: u32, total: f64) -> PeriodBucket {
        PeriodBucket {
            period: month(m),
            total,
            count: 1,
        }
    }

    fn series(values: &[(u32, f64)]) -> PeriodSeries {
        values.iter().map(|(m, t)| bucket(*m, *t)).collect()
    }

    #[test]
    fn test_outer_join_fills_missing_side_with_zero() {
        let rows = compute_profit(&series(&[(1, 100.0)]), &series(&[(2, 40.0)]));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period, month(1));
        assert_eq!((rows[0].sales_total, rows[0].expense_total, rows[0].net_profit), (100.0, 0.0, 100.0));
        assert_eq!(rows[1].period, month(2));
        assert_eq!((rows[1].sales_total, rows[1].expense_total, rows[1].net_profit), (0.0, 40.0, -40.0));
        assert_eq!(rows[1].sales_count, 0);
    }

    #[test]
    fn test_first_row_has_no_change() {
        let rows = compute_profit(&series(&[(1, 100.0), (2, 150.0)]), &vec![]);
        assert_eq!(rows[0].prior_net_profit, None);
        assert_eq!(rows[0].pct_change, None);
        assert_eq!(rows[1].prior_net_profit, Some(100.0));
        assert_eq!(rows[1].pct_change, Some(50.0));
    }

    #[test]
    fn test_zero_prior_substitutes_one() {
        let rows = compute_profit(
            &series(&[(1, 10.0), (2, 50.0)]),
            &series(&[(1, 10.0)]),
        );
        assert_eq!(rows[1].prior_net_profit, Some(0.0));
        assert_eq!(rows[1].pct_change, Some(5000.0));
    }

    #[test]
    fn test_zero_prior_undefined_policy() {
        let rows = compute_profit_with(
            &series(&[(1, 10.0), (2, 50.0)]),
            &series(&[(1, 10.0)]),
            ZeroDivisorPolicy::Undefined,
        );
        assert_eq!(rows[1].pct_change, None);
        assert_eq!(classify_trend(&rows), TrendInsight::InsufficientHistory);
    }

    #[test]
    fn test_negative_prior_change() {
        let rows = compute_profit(&series(&[(1, 0.0), (2, 50.0)]), &series(&[(1, 100.0)]));
        // (50 - -100) / -100 * 100
        assert_eq!(rows[1].pct_change, Some(-150.0));
    }

    #[test]
    fn test_classify_trend() {
        let classify = |a: f64, b: f64| {
            classify_trend(&compute_profit(&series(&[(1, a), (2, b)]), &vec![]))
        };
        assert_eq!(classify(100.0, 120.0), TrendInsight::StrongGrowth { pct: 20.0 });
        assert_eq!(classify(100.0, 110.0), TrendInsight::ModerateGrowth { pct: 10.0 });
        assert_eq!(classify(100.0, 115.0), TrendInsight::ModerateGrowth { pct: 15.0 });
        assert_eq!(classify(100.0, 100.0), TrendInsight::Decline { pct: 0.0 });
        assert_eq!(classify(100.0, 80.0), TrendInsight::Decline { pct: -20.0 });
        assert_eq!(classify(100.0, -5.0), TrendInsight::Loss { net_profit: -5.0 });
    }

    #[test]
    fn test_classify_trend_needs_history() {
        assert_eq!(classify_trend(&[]), TrendInsight::InsufficientHistory);
        let single = compute_profit(&vec![], &series(&[(1, 40.0)]));
        assert_eq!(classify_trend(&single), TrendInsight::InsufficientHistory);
    }

    #[test]
    fn test_totals() {
        let rows = compute_profit(&series(&[(1, 100.0), (2, 50.0)]), &series(&[(2, 70.0)]));
        let t = totals(&rows);
        assert_eq!(t.sales, 150.0);
        assert_eq!(t.expenses, 70.0);
        assert_eq!(t.net, 80.0);
        assert_eq!(t.sales_count, 2);
    }

    #[test]
    fn test_sales_kpis() {
        let rec = |d: &str, amount: f64, label: &str| CleanedRecord {
            timestamp: parse_datetime(d).unwrap(),
            amount,
            label: Some(label.to_string()),
        };
        let records = vec![
            rec("01/01/24", 10.0, "Chocolate"),
            rec("02/01/24", 30.0, "Morango"),
            rec("01/02/24", 25.0, "Chocolate"),
        ];
        let monthly = aggregate(&records, Granularity::Month);
        let kpis = sales_kpis(&records, &monthly);
        assert_eq!(kpis.grand_total, 65.0);
        assert_eq!(kpis.monthly_mean, 32.5);
        assert_eq!(kpis.best_month.unwrap().period, month(1));
        assert_eq!(kpis.best_ticket, Some((month(2), 25.0)));
        assert_eq!(kpis.top_labels[0].label, "Chocolate");
        assert_eq!(kpis.top_labels[0].revenue, 35.0);
        assert_eq!(kpis.top_labels.len(), 2);
    }

    #[test]
    fn test_sales_kpis_empty() {
        let kpis = sales_kpis(&[], &vec![]);
        assert_eq!(kpis.grand_total, 0.0);
        assert_eq!(kpis.monthly_mean, 0.0);
        assert!(kpis.best_month.is_none());
        assert!(kpis.best_ticket.is_none());
        assert!(kpis.top_labels.is_empty());
    }
}
