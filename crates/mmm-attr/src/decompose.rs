//! Per-period split of predicted outcome into baseline and channel credit.

use std::collections::BTreeMap;

use mmm_core::errors::MmmError;
use mmm_core::numeric::finite_or_zero;
use mmm_core::types::CoefficientSampleSet;
use mmm_transform::inverse_log_transform;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::design::{CoefficientPoint, ModelDesign};

/// One period of the decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionRow {
    /// Period index.
    pub period: usize,
    /// Observed outcome.
    pub actual: f64,
    /// Predicted outcome at the posterior mean.
    pub predicted: f64,
    /// Outcome without media, floored at zero.
    pub baseline: f64,
    /// Credit per channel, all non-negative.
    pub channels: BTreeMap<String, f64>,
}

/// Decomposition over every period plus per-channel totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionTable {
    /// Channel names in column order.
    pub channel_order: Vec<String>,
    /// Rows in period order.
    pub rows: Vec<DecompositionRow>,
    /// Sum of each channel column; the input to Shapley attribution.
    pub channel_totals: BTreeMap<String, f64>,
}

/// Splits predicted outcome into baseline and channel credit using posterior means.
///
/// A channel's credit in period `t` is its share of the log-space media sum
/// times the media effect `predicted - baseline`. When the log-space sum or the
/// media effect is not positive every channel receives zero for that period.
pub fn decompose(
    design: &ModelDesign,
    samples: &CoefficientSampleSet,
    actual: &[f64],
) -> Result<DecompositionTable, MmmError> {
    if actual.len() != design.n_periods() {
        return Err(MmmError::invalid(
            "period-mismatch",
            "actual outcome length differs from the design",
        )
        .with_context("actual", actual.len())
        .with_context("design", design.n_periods()));
    }
    let point = CoefficientPoint::posterior_mean(samples)?;
    design.check_point(&point)?;
    let offset = design.log_offset();
    let baseline_log = design.baseline_log(&point);
    let channels = design.channels();

    let mut totals: BTreeMap<String, f64> = channels.iter().map(|c| (c.clone(), 0.0)).collect();
    let mut degenerate = 0usize;
    let rows = baseline_log
        .iter()
        .enumerate()
        .map(|(t, &base_log)| {
            let terms = design.media_terms(&point, t);
            let media_log: f64 = terms.iter().sum();
            let predicted = inverse_log_transform(base_log + media_log, offset);
            let baseline_raw = inverse_log_transform(base_log, offset);
            let media_effect = predicted - baseline_raw;
            let credit_possible = media_log > 0.0 && media_effect > 0.0;
            if !credit_possible {
                degenerate += 1;
            }
            let credits = channels
                .iter()
                .zip(&terms)
                .map(|(channel, term)| {
                    let credit = if credit_possible {
                        finite_or_zero((term / media_log * media_effect).max(0.0))
                    } else {
                        0.0
                    };
                    if let Some(total) = totals.get_mut(channel) {
                        *total += credit;
                    }
                    (channel.clone(), credit)
                })
                .collect();
            DecompositionRow {
                period: t,
                actual: actual[t],
                predicted: finite_or_zero(predicted),
                baseline: finite_or_zero(baseline_raw.max(0.0)),
                channels: credits,
            }
        })
        .collect();
    if degenerate > 0 {
        warn!(periods = degenerate, "periods with no positive media effect received zero channel credit");
    }
    debug!(periods = design.n_periods(), "decomposed outcome");
    Ok(DecompositionTable {
        channel_order: channels.to_vec(),
        rows,
        channel_totals: totals,
    })
}

impl DecompositionTable {
    /// Channel totals in column order.
    pub fn ordered_totals(&self) -> Vec<(String, f64)> {
        self.channel_order
            .iter()
            .map(|c| (c.clone(), self.channel_totals.get(c).copied().unwrap_or(0.0)))
            .collect()
    }
}
