//! Seasonality, trend, event and control feature builders.

use std::f64::consts::PI;

use mmm_core::errors::MmmError;
use mmm_core::numeric::{mean, std_dev};
use mmm_core::types::FeatureBlock;
use serde::{Deserialize, Serialize};

const STANDARDIZE_EPS: f64 = 1e-8;

/// Fourier seasonality block for periods `0..n`.
pub fn fourier_features(n: usize, period: f64, harmonics: usize) -> Result<FeatureBlock, MmmError> {
    fourier_features_at(0, n, period, harmonics)
}

/// Fourier block for periods `offset..offset + n`, used to continue a training
/// season into held-out periods. Columns alternate `sin_k`, `cos_k` for `k = 1..=harmonics`.
pub fn fourier_features_at(
    offset: usize,
    n: usize,
    period: f64,
    harmonics: usize,
) -> Result<FeatureBlock, MmmError> {
    if !(period.is_finite() && period > 0.0) {
        return Err(MmmError::invalid("seasonality-period", "seasonality period must be > 0")
            .with_context("period", period));
    }
    if harmonics == 0 {
        return Err(MmmError::invalid("fourier-harmonics", "at least one harmonic is required"));
    }
    let names = (1..=harmonics)
        .flat_map(|k| [format!("sin_{k}"), format!("cos_{k}")])
        .collect();
    let values = (offset..offset + n)
        .map(|t| {
            (1..=harmonics)
                .flat_map(|k| {
                    let angle = 2.0 * PI * k as f64 * t as f64 / period;
                    [angle.sin(), angle.cos()]
                })
                .collect()
        })
        .collect();
    FeatureBlock::new(names, values)
}

/// Shape of the deterministic trend regressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    /// All zeros.
    None,
    /// `t / total`.
    #[default]
    Linear,
    /// `ln(1 + t) / ln(1 + total)`.
    Log,
    /// `(t / total)^2`.
    Quadratic,
}

impl TrendKind {
    fn raw(self, t: usize, total: usize) -> f64 {
        let (t, total) = (t as f64, total as f64);
        match self {
            TrendKind::None => 0.0,
            TrendKind::Linear => t / total,
            TrendKind::Log => t.ln_1p() / total.ln_1p(),
            TrendKind::Quadratic => (t / total).powi(2),
        }
    }
}

/// Trend over `0..n`, rescaled so its maximum is 1.
pub fn trend_feature(n: usize, kind: TrendKind) -> Vec<f64> {
    trend_feature_at(0, n, n, kind)
}

/// Trend for periods `offset..offset + n` with denominator `total`, rescaled to max 1.
pub fn trend_feature_at(offset: usize, n: usize, total: usize, kind: TrendKind) -> Vec<f64> {
    if total == 0 {
        return vec![0.0; n];
    }
    let mut trend: Vec<f64> = (offset..offset + n).map(|t| kind.raw(t, total)).collect();
    let max = trend.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        for value in trend.iter_mut() {
            *value /= max;
        }
    }
    trend
}

/// Inclusive window of periods during which an event is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    /// Column label.
    pub name: String,
    /// First active period.
    pub start: usize,
    /// Last active period (inclusive).
    pub end: usize,
}

/// Binary indicator block, one column per window.
pub fn event_indicators(n: usize, windows: &[EventWindow]) -> Result<FeatureBlock, MmmError> {
    for window in windows {
        if window.start > window.end {
            return Err(MmmError::invalid("event-window", "event window starts after it ends")
                .with_context("event", &window.name)
                .with_context("start", window.start)
                .with_context("end", window.end));
        }
    }
    let names = windows.iter().map(|w| w.name.clone()).collect();
    let values = (0..n)
        .map(|t| {
            windows
                .iter()
                .map(|w| if (w.start..=w.end).contains(&t) { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();
    FeatureBlock::new(names, values)
}

/// Standardizes every column to `(x - mean) / (std + 1e-8)`.
pub fn standardize_columns(block: &FeatureBlock) -> Result<FeatureBlock, MmmError> {
    if block.rows() == 0 || block.width() == 0 {
        return Ok(block.clone());
    }
    let columns: Vec<Vec<f64>> = (0..block.width())
        .map(|idx| {
            let column = block.column(idx);
            let (mu, sigma) = (mean(&column), std_dev(&column));
            column
                .into_iter()
                .map(|v| (v - mu) / (sigma + STANDARDIZE_EPS))
                .collect()
        })
        .collect();
    FeatureBlock::from_columns(block.names.clone(), &columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourier_starts_at_zero_phase() {
        let block = fourier_features(4, 52.0, 2).unwrap();
        assert_eq!(block.names, vec!["sin_1", "cos_1", "sin_2", "cos_2"]);
        assert_eq!(block.row(0), &[0.0, 1.0, 0.0, 1.0]);
        assert!(fourier_features(4, 0.0, 2).is_err());
    }

    #[test]
    fn fourier_continuation_matches_full_range() {
        let full = fourier_features(10, 7.0, 3).unwrap();
        let tail = fourier_features_at(6, 4, 7.0, 3).unwrap();
        assert_eq!(&full.values[6..], &tail.values[..]);
    }

    #[test]
    fn trends_peak_at_one() {
        for kind in [TrendKind::Linear, TrendKind::Log, TrendKind::Quadratic] {
            let trend = trend_feature(5, kind);
            assert_eq!(trend[0], 0.0);
            assert!((trend[4] - 1.0).abs() < 1e-12);
        }
        assert_eq!(trend_feature(3, TrendKind::None), vec![0.0; 3]);
    }

    #[test]
    fn linear_trend_is_evenly_spaced() {
        let trend = trend_feature(5, TrendKind::Linear);
        for (value, expected) in trend.iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
            assert!((value - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn events_are_inclusive() {
        let windows = vec![EventWindow {
            name: "promo".into(),
            start: 1,
            end: 2,
        }];
        let block = event_indicators(4, &windows).unwrap();
        assert_eq!(block.column(0), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn standardized_columns_are_centered() {
        let block =
            FeatureBlock::new(vec!["price".into()], vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let out = standardize_columns(&block).unwrap();
        let column = out.column(0);
        assert!(mean(&column).abs() < 1e-12);
        assert!(column[2] > 1.2 && column[2] < 1.3);
    }
}
