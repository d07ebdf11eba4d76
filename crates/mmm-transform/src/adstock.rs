//! Geometric adstock: decayed carryover of spend into later periods.

use mmm_core::errors::{ErrorInfo, MmmError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

fn adstock_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

/// Checks `decay_rate` lies in `[0, 1)`.
pub fn check_decay(decay_rate: f64) -> Result<(), MmmError> {
    if !(decay_rate.is_finite() && (0.0..1.0).contains(&decay_rate)) {
        return Err(adstock_error("decay-out-of-range", "decay rate must lie in [0, 1)")
            .with_context("decay_rate", decay_rate));
    }
    Ok(())
}

/// Geometric adstock of a single spend series.
///
/// `out[0] = x[0]` and `out[t] = x[t] + decay_rate * out[t - 1]`. The filter is
/// causal: `out[t]` only depends on `x[..=t]`. With `normalize` the whole series
/// is multiplied by `1 - decay_rate`.
pub fn geometric_adstock(x: &[f64], decay_rate: f64, normalize: bool) -> Result<Vec<f64>, MmmError> {
    check_decay(decay_rate)?;
    if let Some(period) = x.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
        return Err(adstock_error("negative-spend", "spend must be finite and >= 0")
            .with_context("period", period));
    }
    let scale = if normalize { 1.0 - decay_rate } else { 1.0 };
    let adstocked = x
        .iter()
        .scan(0.0_f64, |carry, &spend| {
            *carry = spend + decay_rate * *carry;
            Some(*carry)
        })
        .map(|value| value * scale)
        .collect();
    Ok(adstocked)
}

/// Decay specification for a multi-channel adstock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum DecayRates {
    /// One rate shared by every channel.
    Shared(f64),
    /// One rate per channel, in column order.
    PerChannel(Vec<f64>),
}

impl DecayRates {
    fn rate(&self, column: usize) -> f64 {
        match self {
            DecayRates::Shared(rate) => *rate,
            DecayRates::PerChannel(rates) => rates[column],
        }
    }
}

/// Applies [`geometric_adstock`] independently to each column.
///
/// Columns are processed in parallel; the recursion inside each column stays sequential.
pub fn geometric_adstock_matrix(
    columns: &[Vec<f64>],
    decay_rates: &DecayRates,
    normalize: bool,
) -> Result<Vec<Vec<f64>>, MmmError> {
    if let DecayRates::PerChannel(rates) = decay_rates {
        if rates.len() != columns.len() {
            return Err(adstock_error(
                "decay-length-mismatch",
                "per-channel decay vector length differs from the column count",
            )
            .with_context("columns", columns.len())
            .with_context("rates", rates.len()));
        }
    }
    columns
        .par_iter()
        .enumerate()
        .map(|(idx, column)| {
            geometric_adstock(column, decay_rates.rate(idx), normalize)
                .map_err(|err| err.with_context("column", idx))
        })
        .collect()
}
