//! Per-channel elasticity summaries and log-space contribution estimates.

use mmm_core::config::AttributionSettings;
use mmm_core::errors::{ErrorInfo, MmmError};
use mmm_core::numeric::{finite_or_zero, mean, percentile, std_dev};
use mmm_core::types::CoefficientSampleSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Posterior summary of one channel's elasticity and contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelContribution {
    /// Channel name.
    pub channel: String,
    /// Posterior mean elasticity.
    pub elasticity_mean: f64,
    /// Population standard deviation of the elasticity draws.
    pub elasticity_std: f64,
    /// Lower credible bound (3rd percentile by default).
    pub elasticity_ci_lower: f64,
    /// Upper credible bound (97th percentile by default).
    pub elasticity_ci_upper: f64,
    /// Mean of `β · mean(log media) · mean outcome`.
    pub contribution_mean: f64,
    /// Standard deviation of the contribution draws.
    pub contribution_std: f64,
}

/// Summarizes pooled `beta` draws per channel.
///
/// `log_media` is column-major and must hold one column per channel.
pub fn compute_channel_contributions(
    samples: &CoefficientSampleSet,
    log_media: &[Vec<f64>],
    mean_outcome: f64,
    channels: &[String],
    settings: &AttributionSettings,
) -> Result<Vec<ChannelContribution>, MmmError> {
    if channels.is_empty() {
        return Err(MmmError::invalid("empty-channels", "at least one channel is required"));
    }
    let beta = samples.require(CoefficientSampleSet::BETA)?;
    if beta.dim() != channels.len() || log_media.len() != channels.len() {
        return Err(MmmError::InvalidInput(
            ErrorInfo::new(
                "channel-dimension-mismatch",
                "elasticity draws, log media and channel names must agree in width",
            )
            .with_context("channels", channels.len())
            .with_context("beta", beta.dim())
            .with_context("log_media", log_media.len()),
        ));
    }
    debug!(
        channels = channels.len(),
        draws = beta.pooled_len(),
        "computing channel contributions"
    );
    let summaries = channels
        .par_iter()
        .enumerate()
        .map(|(idx, channel)| {
            let draws = beta.pooled(idx);
            let scale = mean(&log_media[idx]) * mean_outcome;
            let contributions: Vec<f64> = draws.iter().map(|b| b * scale).collect();
            ChannelContribution {
                channel: channel.clone(),
                elasticity_mean: finite_or_zero(mean(&draws)),
                elasticity_std: finite_or_zero(std_dev(&draws)),
                elasticity_ci_lower: finite_or_zero(percentile(&draws, settings.ci_lower_pct)),
                elasticity_ci_upper: finite_or_zero(percentile(&draws, settings.ci_upper_pct)),
                contribution_mean: finite_or_zero(mean(&contributions)),
                contribution_std: finite_or_zero(std_dev(&contributions)),
            }
        })
        .collect();
    Ok(summaries)
}
