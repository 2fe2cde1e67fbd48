use crate::error::{LedgerError, Result};
use crate::fmt::money;
use crate::metrics::ProfitRow;

pub const MIN_PERIODS: usize = 4;
const CHANGE_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastResult {
    pub predicted_next: f64,
    pub historical_mae: f64,
    pub last_actual: f64,
    pub slope: f64,
    pub intercept: f64,
    pub next_index: usize,
}

/// Fit net profit against the zero-based period position with ordinary
/// least squares and extrapolate one period ahead.
///
/// The MAE is in-sample: it measures the fit over the same periods the line
/// was fitted on.
pub fn forecast(rows: &[ProfitRow]) -> Result<ForecastResult> {
    if rows.len() < MIN_PERIODS {
        return Err(LedgerError::InsufficientData {
            needed: MIN_PERIODS,
            found: rows.len(),
        });
    }

    let n = rows.len() as f64;
    let ys: Vec<f64> = rows.iter().map(|r| r.net_profit).collect();
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let historical_mae = ys
        .iter()
        .enumerate()
        .map(|(i, y)| (intercept + slope * i as f64 - y).abs())
        .sum::<f64>()
        / n;

    let next_index = rows.len();
    let result = ForecastResult {
        predicted_next: intercept + slope * next_index as f64,
        historical_mae,
        last_actual: ys[ys.len() - 1],
        slope,
        intercept,
        next_index,
    };
    tracing::info!(
        periods = rows.len(),
        predicted_next = result.predicted_next,
        historical_mae = result.historical_mae,
        "fitted net profit trend"
    );
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForecastInsight {
    PredictedLoss { predicted: f64 },
    GrowthExpected { delta: f64 },
    DeclineRisk { delta: f64 },
    StabilityExpected,
}

impl ForecastInsight {
    pub fn headline(&self) -> String {
        match *self {
            Self::PredictedLoss { predicted } => format!(
                "Loss predicted: negative profit of {} expected.",
                money(predicted.abs())
            ),
            Self::GrowthExpected { delta } => {
                format!("Profit growth expected: up {}.", money(delta))
            }
            Self::DeclineRisk { delta } => format!(
                "Risk of falling profit: down {} expected. Review your costs.",
                money(delta.abs())
            ),
            Self::StabilityExpected => {
                "Stability expected: projected profit close to the last period.".to_string()
            }
        }
    }

    /// Banner colour for the dashboard.
    pub fn color(&self) -> &'static str {
        match self {
            Self::PredictedLoss { .. } => "#dc3545",
            Self::GrowthExpected { .. } => "#28a745",
            Self::DeclineRisk { .. } => "#ffc107",
            Self::StabilityExpected => "#17a2b8",
        }
    }
}

/// Compare the prediction with the last actual value. Moves within 10% of
/// the last actual count as stable; with a last actual of 0 any move counts.
pub fn classify_forecast(result: &ForecastResult) -> ForecastInsight {
    if result.predicted_next < 0.0 {
        return ForecastInsight::PredictedLoss {
            predicted: result.predicted_next,
        };
    }
    let delta = result.predicted_next - result.last_actual;
    let threshold = result.last_actual.abs() * CHANGE_THRESHOLD;
    if delta > threshold {
        ForecastInsight::GrowthExpected { delta }
    } else if delta < -threshold {
        ForecastInsight::DeclineRisk { delta }
    } else {
        ForecastInsight::StabilityExpected
    }
}
