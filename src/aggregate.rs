use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::CleanedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Week,
    Month,
}

/// A calendar bucket. Weeks are ISO-8601: Monday start, numbered within the
/// ISO week-year, so a run on any day buckets a given timestamp identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Week { iso_year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl Period {
    pub fn of(timestamp: &NaiveDateTime, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Week => {
                let iso = timestamp.date().iso_week();
                Period::Week {
                    iso_year: iso.year(),
                    week: iso.week(),
                }
            }
            Granularity::Month => Period::Month {
                year: timestamp.year(),
                month: timestamp.month(),
            },
        }
    }

    /// First calendar day of the bucket.
    pub fn start(&self) -> Option<NaiveDate> {
        match *self {
            Period::Week { iso_year, week } => {
                NaiveDate::from_isoywd_opt(iso_year, week, Weekday::Mon)
            }
            Period::Month { year, month } => NaiveDate::from_ymd_opt(year, month, 1),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Week { iso_year, week } => write!(f, "{iso_year:04}-W{week:02}"),
            Period::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodBucket {
    pub period: Period,
    pub total: f64,
    pub count: usize,
}

impl PeriodBucket {
    /// Average amount per record (the "ticket").
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Buckets in ascending period order. Periods without records are absent.
pub type PeriodSeries = Vec<PeriodBucket>;

pub fn aggregate(records: &[CleanedRecord], granularity: Granularity) -> PeriodSeries {
    let mut buckets: BTreeMap<Period, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = buckets
            .entry(Period::of(&record.timestamp, granularity))
            .or_default();
        entry.0 += record.amount;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(period, (total, count))| PeriodBucket {
            period,
            total,
            count,
        })
        .collect()
}

/// Records whose timestamp falls in the given calendar month.
pub fn filter_month(records: &[CleanedRecord], year: i32, month: u32) -> Vec<CleanedRecord> {
    records
        .iter()
        .filter(|r| r.timestamp.year() == year && r.timestamp.month() == month)
        .cloned()
        .collect()
}
