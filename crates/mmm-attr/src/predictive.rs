//! Point predictions, posterior predictive bands and coefficient summaries.

use mmm_core::config::AttributionSettings;
use mmm_core::errors::MmmError;
use mmm_core::numeric::{finite_or_zero, mean, percentile, sanitize};
use mmm_core::rng::{RngHandle, PREDICTIVE_SUBSTREAM};
use mmm_core::types::CoefficientSampleSet;
use mmm_transform::inverse_log_series;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::design::{CoefficientPoint, ModelDesign};
use crate::fit::{holdout_metrics, HoldoutMetrics};

/// Log-space prediction of `design` at `point`.
pub fn predict_log(design: &ModelDesign, point: &CoefficientPoint) -> Result<Vec<f64>, MmmError> {
    design.check_point(point)?;
    Ok(design.predict_log(point))
}

/// Prediction on the original scale, `exp(log) - offset`.
pub fn predict(design: &ModelDesign, point: &CoefficientPoint) -> Result<Vec<f64>, MmmError> {
    let mut values = inverse_log_series(&predict_log(design, point)?, design.log_offset());
    sanitize(&mut values);
    Ok(values)
}

/// Scores a held-out design at the posterior mean against `actual`.
pub fn evaluate_holdout(
    design: &ModelDesign,
    samples: &CoefficientSampleSet,
    actual: &[f64],
) -> Result<HoldoutMetrics, MmmError> {
    let point = CoefficientPoint::posterior_mean(samples)?;
    holdout_metrics(actual, &predict(design, &point)?)
}

/// Per-period predictive band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveBand {
    /// Observed outcome.
    pub actual: Vec<f64>,
    /// Prediction at the posterior mean.
    pub predicted: Vec<f64>,
    /// Lower percentile across sampled draws.
    pub lower: Vec<f64>,
    /// Upper percentile across sampled draws.
    pub upper: Vec<f64>,
    /// Number of draws used.
    pub draws_used: usize,
}

/// Predictive band from up to `settings.predictive_draws` pooled draws chosen
/// without replacement from the predictive substream of `seed`.
pub fn posterior_predictive(
    design: &ModelDesign,
    samples: &CoefficientSampleSet,
    actual: &[f64],
    settings: &AttributionSettings,
    seed: u64,
) -> Result<PredictiveBand, MmmError> {
    if actual.len() != design.n_periods() {
        return Err(MmmError::invalid(
            "period-mismatch",
            "actual outcome length differs from the design",
        ));
    }
    let pooled = samples.pooled_len();
    let count = settings.predictive_draws.min(pooled);
    if count == 0 {
        return Err(MmmError::invalid("empty-samples", "no draws available for prediction"));
    }
    let mut rng = RngHandle::substream(seed, PREDICTIVE_SUBSTREAM);
    let chosen = index::sample(&mut rng, pooled, count).into_vec();
    debug!(draws = count, pooled, "sampling posterior predictive");

    let trajectories = chosen
        .par_iter()
        .map(|&draw| {
            let point = CoefficientPoint::draw(samples, draw)?;
            predict(design, &point)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let periods = design.n_periods();
    let mut lower = Vec::with_capacity(periods);
    let mut upper = Vec::with_capacity(periods);
    for t in 0..periods {
        let column: Vec<f64> = trajectories.iter().map(|traj| traj[t]).collect();
        lower.push(finite_or_zero(percentile(&column, settings.predictive_lower_pct)));
        upper.push(finite_or_zero(percentile(&column, settings.predictive_upper_pct)));
    }
    let point = CoefficientPoint::posterior_mean(samples)?;
    Ok(PredictiveBand {
        actual: actual.to_vec(),
        predicted: predict(design, &point)?,
        lower,
        upper,
        draws_used: count,
    })
}

/// Posterior summary of one labelled coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    /// Label of the regressor.
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// 2.5th percentile.
    pub ci_lower: f64,
    /// 97.5th percentile.
    pub ci_upper: f64,
}

/// Mean and 95% interval of every component of `parameter`, labelled by `labels`.
pub fn coefficient_summaries(
    samples: &CoefficientSampleSet,
    parameter: &str,
    labels: &[String],
) -> Result<Vec<CoefficientSummary>, MmmError> {
    let draws = samples.require(parameter)?;
    if draws.dim() != labels.len() {
        return Err(MmmError::invalid(
            "coefficient-dimension-mismatch",
            "label count differs from the parameter dimension",
        )
        .with_context("parameter", parameter)
        .with_context("labels", labels.len())
        .with_context("dim", draws.dim()));
    }
    Ok(labels
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let pooled = draws.pooled(idx);
            CoefficientSummary {
                name: name.clone(),
                mean: finite_or_zero(mean(&pooled)),
                ci_lower: finite_or_zero(percentile(&pooled, 2.5)),
                ci_upper: finite_or_zero(percentile(&pooled, 97.5)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmm_core::types::ParameterDraws;

    fn samples() -> CoefficientSampleSet {
        let intercepts: Vec<f64> = (0..40).map(|i| 1.0 + 0.01 * i as f64).collect();
        let betas: Vec<f64> = (0..40).map(|i| 0.2 + 0.005 * i as f64).collect();
        CoefficientSampleSet::new()
            .with(
                "intercept",
                ParameterDraws::scalar(vec![intercepts[..20].to_vec(), intercepts[20..].to_vec()])
                    .unwrap(),
            )
            .unwrap()
            .with(
                "beta",
                ParameterDraws::scalar(vec![betas[..20].to_vec(), betas[20..].to_vec()]).unwrap(),
            )
            .unwrap()
    }

    fn design() -> ModelDesign {
        ModelDesign::new(vec!["tv".into()], vec![vec![1.0, 2.0, 3.0]], 1.0).unwrap()
    }

    #[test]
    fn band_brackets_mean_prediction() {
        let band = posterior_predictive(
            &design(),
            &samples(),
            &[5.0, 6.0, 7.0],
            &AttributionSettings::default(),
            42,
        )
        .unwrap();
        assert_eq!(band.draws_used, 40);
        for t in 0..3 {
            assert!(band.lower[t] <= band.predicted[t] && band.predicted[t] <= band.upper[t]);
        }
    }

    #[test]
    fn band_is_seed_stable() {
        let mut settings = AttributionSettings::default();
        settings.predictive_draws = 10;
        let a = posterior_predictive(&design(), &samples(), &[5.0, 6.0, 7.0], &settings, 9).unwrap();
        let b = posterior_predictive(&design(), &samples(), &[5.0, 6.0, 7.0], &settings, 9).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.draws_used, 10);
    }

    #[test]
    fn summaries_need_matching_labels() {
        let labels = vec!["tv".to_string()];
        let out = coefficient_summaries(&samples(), "beta", &labels).unwrap();
        assert!(out[0].ci_lower < out[0].mean && out[0].mean < out[0].ci_upper);
        let err = coefficient_summaries(&samples(), "beta", &[]).unwrap_err();
        assert_eq!(err.info().code, "coefficient-dimension-mismatch");
        assert!(coefficient_summaries(&samples(), "gamma_events", &labels).is_err());
    }

    #[test]
    fn holdout_scores_posterior_mean() {
        let point = CoefficientPoint::posterior_mean(&samples()).unwrap();
        let predicted = predict(&design(), &point).unwrap();
        let metrics = evaluate_holdout(&design(), &samples(), &predicted).unwrap();
        assert!(metrics.mape < 1e-9);
        assert_eq!(metrics.n_periods, 3);
    }
}
