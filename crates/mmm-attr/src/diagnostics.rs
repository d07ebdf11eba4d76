//! Convergence checks on estimator draws: split R-hat, bulk ESS and divergences.

use mmm_core::config::ConvergenceThresholds;
use mmm_core::errors::MmmError;
use mmm_core::numeric::mean;
use mmm_core::types::CoefficientSampleSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / (values.len() - 1) as f64
}

/// Gelman-Rubin statistic over half-chains.
///
/// Returns `None` when a run holds fewer than four draws, or when every
/// half-chain is constant but the half-chains disagree.
pub fn split_rhat(runs: &[Vec<f64>]) -> Option<f64> {
    let n = runs.iter().map(Vec::len).min()?;
    let half = n / 2;
    if half < 2 {
        return None;
    }
    let halves: Vec<&[f64]> = runs
        .iter()
        .flat_map(|run| [&run[..half], &run[run.len() - half..]])
        .collect();
    let means: Vec<f64> = halves.iter().map(|h| mean(h)).collect();
    let within = mean(&halves.iter().map(|h| sample_variance(h)).collect::<Vec<_>>());
    let between = sample_variance(&means);
    if within <= 0.0 {
        return if between <= 0.0 { Some(1.0) } else { None };
    }
    let var_plus = (half as f64 - 1.0) / half as f64 * within + between;
    Some((var_plus / within).sqrt())
}

fn autocovariance(run: &[f64], mu: f64, lag: usize) -> f64 {
    let n = run.len();
    (0..n - lag)
        .map(|t| (run[t] - mu) * (run[t + lag] - mu))
        .sum::<f64>()
        / n as f64
}

/// Bulk effective sample size combined across runs.
///
/// Autocorrelations are truncated with Geyer's initial positive sequence and
/// made monotone before summing.
pub fn effective_sample_size(runs: &[Vec<f64>]) -> f64 {
    let m = runs.len();
    let n = runs.iter().map(Vec::len).min().unwrap_or(0);
    let total = (m * n) as f64;
    if m == 0 || n < 4 {
        return total;
    }
    let runs: Vec<&[f64]> = runs.iter().map(|r| &r[..n]).collect();
    let means: Vec<f64> = runs.iter().map(|r| mean(r)).collect();
    let within = mean(&runs.iter().map(|r| sample_variance(r)).collect::<Vec<_>>());
    let between = if m > 1 { sample_variance(&means) } else { 0.0 };
    let var_plus = (n as f64 - 1.0) / n as f64 * within + between;
    if var_plus <= 0.0 {
        return total;
    }
    let rho = |lag: usize| -> f64 {
        let mean_acov = runs
            .iter()
            .zip(&means)
            .map(|(run, &mu)| autocovariance(run, mu, lag))
            .sum::<f64>()
            / m as f64;
        1.0 - (within - mean_acov) / var_plus
    };

    let mut sum = 0.0;
    let mut previous = f64::INFINITY;
    let mut lag = 0;
    while lag + 1 < n {
        let pair = rho(lag) + rho(lag + 1);
        if pair <= 0.0 {
            break;
        }
        let pair = pair.min(previous);
        sum += pair;
        previous = pair;
        lag += 2;
    }
    let tau = (2.0 * sum - 1.0).max(1.0 / total.log10());
    total / tau
}

/// Diagnostics of one parameter component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDiagnostic {
    /// Parameter name.
    pub parameter: String,
    /// Component index.
    pub component: usize,
    /// Split R-hat, `None` when undefined.
    pub rhat: Option<f64>,
    /// Bulk effective sample size.
    pub ess: f64,
}

/// Aggregate convergence verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Largest defined R-hat.
    pub rhat_max: f64,
    /// Smallest ESS.
    pub ess_min: f64,
    /// Components whose R-hat is undefined.
    pub undefined_rhat: usize,
    /// Divergent transitions reported by the estimator.
    pub divergences: u64,
    /// Whether every threshold is met.
    pub converged: bool,
    /// Per-component detail in parameter-name order.
    pub parameters: Vec<ParameterDiagnostic>,
}

/// Computes R-hat and ESS for every component of every parameter.
///
/// A failed check is logged and reported but never returned as an error.
pub fn convergence_diagnostics(
    samples: &CoefficientSampleSet,
    thresholds: &ConvergenceThresholds,
) -> Result<ConvergenceReport, MmmError> {
    if samples.shape().is_none() {
        return Err(MmmError::invalid("empty-samples", "coefficient sample set is empty"));
    }
    let jobs: Vec<(&String, usize)> = samples
        .iter()
        .flat_map(|(name, draws)| (0..draws.dim()).map(move |c| (name, c)))
        .collect();
    let parameters: Vec<ParameterDiagnostic> = jobs
        .par_iter()
        .map(|&(name, component)| {
            let draws = samples.get(name).map(|d| {
                (0..d.runs())
                    .map(|run| d.run_component(run, component))
                    .collect::<Vec<_>>()
            });
            let runs = draws.unwrap_or_default();
            ParameterDiagnostic {
                parameter: name.clone(),
                component,
                rhat: split_rhat(&runs),
                ess: effective_sample_size(&runs),
            }
        })
        .collect();

    let rhat_max = parameters
        .iter()
        .filter_map(|p| p.rhat)
        .fold(0.0_f64, f64::max);
    let ess_min = parameters
        .iter()
        .map(|p| p.ess)
        .fold(f64::INFINITY, f64::min);
    let undefined_rhat = parameters.iter().filter(|p| p.rhat.is_none()).count();
    let divergences = samples.diagnostics().divergences;
    let converged = undefined_rhat == 0
        && rhat_max < thresholds.max_rhat
        && ess_min > thresholds.min_ess
        && divergences <= thresholds.max_divergences;
    if converged {
        debug!(rhat_max, ess_min, "estimator output converged");
    } else {
        warn!(
            rhat_max,
            ess_min,
            undefined_rhat,
            divergences,
            "estimator output failed convergence checks"
        );
    }
    Ok(ConvergenceReport {
        rhat_max,
        ess_min,
        undefined_rhat,
        divergences,
        converged,
        parameters,
    })
}
