//! In-sample fit, holdout accuracy and residual checks.

use mmm_core::errors::MmmError;
use mmm_core::numeric::{finite_or_zero, mean, std_dev};
use mmm_transform::{inverse_log_series, log_transform};
use serde::{Deserialize, Serialize};

/// Histogram bins used by [`residual_analysis`].
pub const RESIDUAL_BINS: usize = 20;
/// Largest autocorrelation lag reported.
pub const MAX_ACF_LAG: usize = 10;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<(), MmmError> {
    if actual.is_empty() {
        return Err(MmmError::invalid("empty-series", "metrics need at least one period"));
    }
    if actual.len() != predicted.len() {
        return Err(MmmError::invalid(
            "period-mismatch",
            "actual and predicted series differ in length",
        )
        .with_context("actual", actual.len())
        .with_context("predicted", predicted.len()));
    }
    Ok(())
}

fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let mu = mean(actual);
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mu).powi(2)).sum();
    if ss_tot > 0.0 {
        finite_or_zero(1.0 - ss_res / ss_tot)
    } else {
        0.0
    }
}

fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let terms: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    finite_or_zero(mean(&terms) * 100.0)
}

/// In-sample fit summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    /// Coefficient of determination in log space.
    pub r_squared: f64,
    /// Mean absolute percentage error on the original scale.
    pub mape: f64,
}

/// R² of `ln(y + offset)` against `predicted_log`, MAPE after inverting the log.
pub fn fit_metrics(y: &[f64], predicted_log: &[f64], offset: f64) -> Result<FitMetrics, MmmError> {
    check_lengths(y, predicted_log)?;
    let y_log = y
        .iter()
        .map(|&v| log_transform(v, offset))
        .collect::<Result<Vec<_>, _>>()?;
    let predicted = inverse_log_series(predicted_log, offset);
    Ok(FitMetrics {
        r_squared: r_squared(&y_log, predicted_log),
        mape: mape(y, &predicted),
    })
}

/// Out-of-sample accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutMetrics {
    /// Mean absolute percentage error.
    pub mape: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination, 0 for a constant actual series.
    pub r_squared: f64,
    /// Number of held-out periods.
    pub n_periods: usize,
    /// Mean actual outcome.
    pub actual_mean: f64,
    /// Mean predicted outcome.
    pub predicted_mean: f64,
}

/// Accuracy of `predicted` against `actual` on the original scale.
pub fn holdout_metrics(actual: &[f64], predicted: &[f64]) -> Result<HoldoutMetrics, MmmError> {
    check_lengths(actual, predicted)?;
    let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let squared: Vec<f64> = errors.iter().map(|e| e * e).collect();
    let absolute: Vec<f64> = errors.iter().map(|e| e.abs()).collect();
    Ok(HoldoutMetrics {
        mape: mape(actual, predicted),
        rmse: finite_or_zero(mean(&squared).sqrt()),
        mae: finite_or_zero(mean(&absolute)),
        r_squared: r_squared(actual, predicted),
        n_periods: actual.len(),
        actual_mean: finite_or_zero(mean(actual)),
        predicted_mean: finite_or_zero(mean(predicted)),
    })
}

/// Fixed-width histogram; the last bin includes its right edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    /// Count per bin.
    pub counts: Vec<u64>,
}

fn histogram(values: &[f64], bins: usize) -> Histogram {
    if values.is_empty() || bins == 0 {
        return Histogram {
            edges: Vec::new(),
            counts: Vec::new(),
        };
    }
    let mut start = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut end = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if start == end {
        start -= 0.5;
        end += 0.5;
    }
    let step = (end - start) / bins as f64;
    let edges = (0..=bins).map(|idx| start + idx as f64 * step).collect();
    let mut counts = vec![0u64; bins];
    for value in values {
        let bin = (((value - start) / step).floor().max(0.0) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    Histogram { edges, counts }
}

/// Residual diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualAnalysis {
    /// Mean residual.
    pub mean: f64,
    /// Population standard deviation of the residuals.
    pub std: f64,
    /// Durbin-Watson statistic; `None` with fewer than two residuals or zero residual energy.
    pub durbin_watson: Option<f64>,
    /// Autocorrelation at lags `0..=min(10, n - 1)`; empty for zero residual energy.
    pub autocorrelation: Vec<f64>,
    /// Residual histogram.
    pub histogram: Histogram,
    /// `actual - predicted` per period.
    pub residuals: Vec<f64>,
}

/// Residual mean, spread, serial correlation and histogram of `actual - predicted`.
pub fn residual_analysis(actual: &[f64], predicted: &[f64]) -> Result<ResidualAnalysis, MmmError> {
    check_lengths(actual, predicted)?;
    let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
    let energy: f64 = residuals.iter().map(|r| r * r).sum();
    let durbin_watson = if residuals.len() > 1 && energy > 0.0 {
        let diff: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        Some(diff / energy)
    } else {
        None
    };

    let mu = mean(&residuals);
    let centered: Vec<f64> = residuals.iter().map(|r| r - mu).collect();
    let denom: f64 = centered.iter().map(|c| c * c).sum();
    let autocorrelation = if denom > 0.0 {
        let max_lag = MAX_ACF_LAG.min(residuals.len() - 1);
        (0..=max_lag)
            .map(|lag| {
                centered
                    .iter()
                    .zip(&centered[lag..])
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    / denom
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(ResidualAnalysis {
        mean: finite_or_zero(mu),
        std: finite_or_zero(std_dev(&residuals)),
        durbin_watson,
        autocorrelation,
        histogram: histogram(&residuals, RESIDUAL_BINS),
        residuals,
    })
}
