//! Budget allocation maximizing `Σ e_i ln s_i` under a budget equality and
//! per-channel share bounds.
//!
//! The search is a sequential quadratic program specialised to the separable
//! log objective. Every iteration solves the QP over the free channels with the
//! diagonal Hessian `-e_i / s_i²` and the linearized budget constraint, takes
//! the longest step the bounds allow (backtracking once the budget holds), and
//! maintains an active set of channels pinned at a bound. The search stops once
//! every free step is negligible relative to that channel's spend, so a channel
//! starting near zero keeps growing until its marginal ratio meets the others. Channels whose
//! elasticity is not positive never gain from spend; they sit at their lower
//! bound unless the other channels cannot absorb the budget.

use std::collections::{BTreeMap, BTreeSet};

use mmm_core::config::OptimizerSettings;
use mmm_core::errors::{ErrorInfo, MmmError};
use mmm_core::numeric::finite_or_zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::marginal::marginal_roi_loglog;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const RELEASE_TOLERANCE: f64 = 1e-9;
const ROUNDING_SLACK: f64 = 1e-14;
/// Largest step, relative to a free channel's spend, accepted at a stationary point.
const STATIONARY_STEP: f64 = 1e-9;
/// Smallest share of the budget a positive-elasticity channel may drop to.
const POSITIVE_FLOOR: f64 = 1e-12;

/// Share bounds of one channel as fractions of the total budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraint {
    /// Lower share.
    pub min_fraction: f64,
    /// Upper share.
    pub max_fraction: f64,
}

impl OptimizationConstraint {
    /// Creates a constraint.
    pub fn new(min_fraction: f64, max_fraction: f64) -> Self {
        Self {
            min_fraction,
            max_fraction,
        }
    }

    /// Default bounds from the optimizer settings.
    pub fn from_settings(settings: &OptimizerSettings) -> Self {
        Self::new(settings.default_min_fraction, settings.default_max_fraction)
    }
}

impl Default for OptimizationConstraint {
    fn default() -> Self {
        Self::from_settings(&OptimizerSettings::default())
    }
}

/// Optimized allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// Spend per channel, summing to the budget.
    pub allocation: BTreeMap<String, f64>,
    /// Marginal ROI at the optimized spend.
    pub marginal_roi: BTreeMap<String, f64>,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether a stationary point was reached before the iteration cap.
    pub converged: bool,
    /// `Σ e_i ln s_i` at the allocation, over channels with positive spend.
    pub objective: f64,
}

/// Failed optimization together with the last iterate, when one exists.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct OptimizationFailure {
    /// Cause of the failure.
    #[source]
    pub error: MmmError,
    /// Last iterate of the search.
    pub best_iterate: Option<BTreeMap<String, f64>>,
}

impl From<MmmError> for OptimizationFailure {
    fn from(error: MmmError) -> Self {
        Self {
            error,
            best_iterate: None,
        }
    }
}

fn opt_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pin {
    Free,
    Lower,
    Upper,
}

struct Problem {
    elasticity: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

fn build_problem(
    total_budget: f64,
    channels: &[String],
    elasticities: &BTreeMap<String, f64>,
    current_spend: &BTreeMap<String, f64>,
    avg_outcome: f64,
    constraints: &BTreeMap<String, OptimizationConstraint>,
    settings: &OptimizerSettings,
) -> Result<Problem, MmmError> {
    if channels.is_empty() {
        return Err(opt_error("empty-channels", "at least one channel is required"));
    }
    if !total_budget.is_finite() || !avg_outcome.is_finite() {
        return Err(opt_error("non-finite-input", "budget and average outcome must be finite")
            .with_context("total_budget", total_budget)
            .with_context("avg_outcome", avg_outcome));
    }
    if total_budget <= 0.0 {
        return Err(MmmError::infeasible("non-positive-budget", "total budget must be > 0")
            .with_context("total_budget", total_budget));
    }
    let mut seen = BTreeSet::new();
    for channel in channels {
        if !seen.insert(channel.as_str()) {
            return Err(opt_error("duplicate-channel", "channel listed twice")
                .with_context("channel", channel));
        }
    }
    if let Some(channel) = constraints.keys().find(|c| !seen.contains(c.as_str())) {
        return Err(opt_error("unknown-channel", "constraint names a channel that is not optimized")
            .with_context("channel", channel));
    }
    if let Some((channel, spend)) = current_spend
        .iter()
        .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
    {
        return Err(opt_error("negative-spend", "current spend must be finite and >= 0")
            .with_context("channel", channel)
            .with_context("spend", spend));
    }

    let fallback = OptimizationConstraint::from_settings(settings);
    let mut problem = Problem {
        elasticity: Vec::with_capacity(channels.len()),
        lower: Vec::with_capacity(channels.len()),
        upper: Vec::with_capacity(channels.len()),
    };
    for channel in channels {
        let elasticity = *elasticities.get(channel).ok_or_else(|| {
            opt_error("missing-elasticity", "no elasticity for channel").with_context("channel", channel)
        })?;
        if !elasticity.is_finite() {
            return Err(opt_error("non-finite-elasticity", "elasticity must be finite")
                .with_context("channel", channel));
        }
        let bounds = constraints.get(channel).copied().unwrap_or(fallback);
        if !(bounds.min_fraction.is_finite() && bounds.max_fraction.is_finite())
            || bounds.min_fraction < 0.0
        {
            return Err(opt_error("constraint-range", "share bounds must be finite and >= 0")
                .with_context("channel", channel)
                .with_context("min_fraction", bounds.min_fraction)
                .with_context("max_fraction", bounds.max_fraction));
        }
        if bounds.min_fraction > bounds.max_fraction {
            return Err(MmmError::infeasible("inverted-bounds", "min share exceeds max share")
                .with_context("channel", channel)
                .with_context("min_fraction", bounds.min_fraction)
                .with_context("max_fraction", bounds.max_fraction));
        }
        problem.elasticity.push(elasticity);
        problem.lower.push(bounds.min_fraction * total_budget);
        problem.upper.push(bounds.max_fraction * total_budget);
    }

    let slack = settings.budget_tolerance * total_budget;
    let lower_sum: f64 = problem.lower.iter().sum();
    let upper_sum: f64 = problem.upper.iter().sum();
    if lower_sum > total_budget + slack {
        return Err(MmmError::infeasible(
            "min-bounds-exceed-budget",
            "minimum shares sum to more than the budget",
        )
        .with_context("min_total", lower_sum)
        .with_context("total_budget", total_budget)
        .with_hint("lower some min_fraction values"));
    }
    if upper_sum < total_budget - slack {
        return Err(MmmError::infeasible(
            "max-bounds-below-budget",
            "maximum shares sum to less than the budget",
        )
        .with_context("max_total", upper_sum)
        .with_context("total_budget", total_budget)
        .with_hint("raise some max_fraction values"));
    }
    Ok(problem)
}

fn clip(values: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((value, lo), hi) in values.iter_mut().zip(lower).zip(upper) {
        *value = value.clamp(*lo, *hi);
    }
}

/// Current proportions rescaled to the budget, clipped, renormalized and clipped again.
fn seed_allocation(
    channels: &[String],
    current_spend: &BTreeMap<String, f64>,
    total_budget: f64,
    problem: &Problem,
) -> Vec<f64> {
    let even = total_budget / channels.len() as f64;
    let current_total: f64 = channels.iter().filter_map(|c| current_spend.get(c)).sum();
    let mut seed: Vec<f64> = if current_total > 0.0 {
        channels
            .iter()
            .map(|c| current_spend.get(c).copied().unwrap_or(even) / current_total * total_budget)
            .collect()
    } else {
        vec![even; channels.len()]
    };
    clip(&mut seed, &problem.lower, &problem.upper);
    let sum: f64 = seed.iter().sum();
    if sum > 0.0 {
        seed.iter_mut().for_each(|v| *v *= total_budget / sum);
    }
    clip(&mut seed, &problem.lower, &problem.upper);
    seed
}

fn objective(elasticity: &[f64], spend: &[f64]) -> f64 {
    elasticity
        .iter()
        .zip(spend)
        .filter(|(_, s)| **s > 0.0)
        .map(|(e, s)| e * s.ln())
        .sum()
}

struct Search<'a> {
    elasticity: &'a [f64],
    lower: &'a [f64],
    upper: &'a [f64],
    target: f64,
    step_tolerance: f64,
    budget_tolerance: f64,
}

struct SearchOutcome {
    spend: Vec<f64>,
    iterations: usize,
    converged: bool,
}

impl Search<'_> {
    fn gradient(&self, spend: &[f64], i: usize) -> f64 {
        self.elasticity[i] / spend[i]
    }

    /// Multiplier of the budget row in the QP over `free`.
    fn multiplier(&self, spend: &[f64], free: &[usize], residual: f64) -> f64 {
        let mass: f64 = free.iter().map(|&i| spend[i]).sum();
        let curvature: f64 = free
            .iter()
            .map(|&i| spend[i] * spend[i] / self.elasticity[i])
            .sum();
        (mass - residual) / curvature
    }

    fn newton_step(&self, spend: &[f64], free: &[usize], residual: f64) -> Vec<f64> {
        let mu = self.multiplier(spend, free, residual);
        let mut step = vec![0.0; spend.len()];
        for &i in free {
            step[i] = spend[i] - mu * spend[i] * spend[i] / self.elasticity[i];
        }
        step
    }

    /// Whether every free channel's step is negligible both against the budget
    /// and against its own spend, i.e. `e_i / s_i` matches the multiplier.
    fn stationary(&self, spend: &[f64], step: &[f64], free: &[usize]) -> bool {
        free.iter().all(|&i| {
            let change = step[i].abs();
            change <= self.step_tolerance && change <= STATIONARY_STEP * spend[i]
        })
    }

    fn max_step(&self, spend: &[f64], step: &[f64], free: &[usize]) -> (f64, Option<(usize, Pin)>) {
        let mut alpha = 1.0;
        let mut blocking = None;
        for &i in free {
            let (ratio, pin) = if step[i] > 0.0 && spend[i] + step[i] > self.upper[i] {
                ((self.upper[i] - spend[i]) / step[i], Pin::Upper)
            } else if step[i] < 0.0 && spend[i] + step[i] < self.lower[i] {
                ((self.lower[i] - spend[i]) / step[i], Pin::Lower)
            } else {
                continue;
            };
            let ratio = ratio.max(0.0);
            if ratio < alpha {
                alpha = ratio;
                blocking = Some((i, pin));
            }
        }
        (alpha, blocking)
    }

    fn advance(&self, spend: &[f64], step: &[f64], alpha: f64) -> Vec<f64> {
        spend
            .iter()
            .zip(step)
            .enumerate()
            .map(|(i, (s, d))| (s + alpha * d).clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    /// Releases one pinned channel whose multiplier has the wrong sign.
    fn release(&self, spend: &[f64], pins: &mut [Pin], residual: f64) -> bool {
        let free: Vec<usize> = (0..spend.len()).filter(|&i| pins[i] == Pin::Free).collect();
        if free.is_empty() {
            return self.release_from_vertex(spend, pins, residual);
        }
        let mu = self.multiplier(spend, &free, residual);
        let mut worst: Option<(usize, f64)> = None;
        for (i, pin) in pins.iter().enumerate() {
            let g = self.gradient(spend, i);
            let violation = match pin {
                Pin::Lower => g - mu,
                Pin::Upper => mu - g,
                Pin::Free => continue,
            };
            if violation > RELEASE_TOLERANCE * mu.abs().max(1e-300)
                && worst.map_or(true, |(_, v)| violation > v)
            {
                worst = Some((i, violation));
            }
        }
        match worst {
            Some((i, _)) => {
                pins[i] = Pin::Free;
                true
            }
            None => false,
        }
    }

    fn release_from_vertex(&self, spend: &[f64], pins: &mut [Pin], residual: f64) -> bool {
        let best_lower = (0..spend.len())
            .filter(|&i| pins[i] == Pin::Lower)
            .max_by(|&a, &b| self.gradient(spend, a).total_cmp(&self.gradient(spend, b)));
        let worst_upper = (0..spend.len())
            .filter(|&i| pins[i] == Pin::Upper)
            .min_by(|&a, &b| self.gradient(spend, a).total_cmp(&self.gradient(spend, b)));
        let feasible = residual.abs() <= self.budget_tolerance;
        let mut released = false;
        if residual > self.budget_tolerance || feasible {
            if let Some(i) = best_lower {
                let trade = worst_upper
                    .map_or(false, |j| self.gradient(spend, i) > self.gradient(spend, j));
                if !feasible || trade {
                    pins[i] = Pin::Free;
                    released = true;
                }
            }
        }
        if residual < -self.budget_tolerance || (feasible && released) {
            if let Some(j) = worst_upper {
                pins[j] = Pin::Free;
                released = true;
            }
        }
        released
    }

    fn run(&self, mut spend: Vec<f64>, max_iterations: usize) -> SearchOutcome {
        let mut pins = vec![Pin::Free; spend.len()];
        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iterations {
            iterations += 1;
            let residual = self.target - spend.iter().sum::<f64>();
            let free: Vec<usize> = (0..spend.len()).filter(|&i| pins[i] == Pin::Free).collect();
            if free.is_empty() {
                if self.release(&spend, &mut pins, residual) {
                    continue;
                }
                converged = residual.abs() <= self.budget_tolerance;
                break;
            }

            let step = self.newton_step(&spend, &free, residual);
            let feasible = residual.abs() <= self.budget_tolerance;
            let stationary = self.stationary(&spend, &step, &free);
            if feasible && stationary {
                if self.release(&spend, &mut pins, residual) {
                    continue;
                }
                converged = true;
                break;
            }

            let (alpha_max, blocking) = self.max_step(&spend, &step, &free);
            let mut alpha = alpha_max;
            if feasible {
                let base = objective(self.elasticity, &spend);
                let noise = ROUNDING_SLACK * base.abs().max(1.0);
                let slope: f64 = free
                    .iter()
                    .map(|&i| self.gradient(&spend, i) * step[i])
                    .sum();
                let mut tries = 0;
                while tries < MAX_BACKTRACKS
                    && objective(self.elasticity, &self.advance(&spend, &step, alpha))
                        < base + ARMIJO * alpha * slope - noise
                {
                    alpha *= 0.5;
                    tries += 1;
                }
                if tries == MAX_BACKTRACKS {
                    if self.release(&spend, &mut pins, residual) {
                        continue;
                    }
                    converged = stationary;
                    break;
                }
            }

            spend = self.advance(&spend, &step, alpha);
            if alpha == alpha_max {
                if let Some((i, pin)) = blocking {
                    spend[i] = match pin {
                        Pin::Upper => self.upper[i],
                        _ => self.lower[i],
                    };
                    pins[i] = pin;
                }
            }
        }
        SearchOutcome {
            spend,
            iterations,
            converged,
        }
    }
}

/// Fills channels that never gain from spend: each starts at its lower bound
/// and they take whatever the other channels cannot absorb, least negative
/// elasticity first.
fn settle_fixed(
    fixed: &[usize],
    movable_capacity: f64,
    total_budget: f64,
    problem: &Problem,
) -> Vec<(usize, f64)> {
    let mut settled: Vec<(usize, f64)> = fixed.iter().map(|&i| (i, problem.lower[i])).collect();
    let floor: f64 = settled.iter().map(|(_, v)| v).sum();
    let mut extra = total_budget - movable_capacity - floor;
    let mut order: Vec<usize> = (0..settled.len()).collect();
    order.sort_by(|&a, &b| {
        problem.elasticity[fixed[b]]
            .total_cmp(&problem.elasticity[fixed[a]])
            .then(a.cmp(&b))
    });
    for slot in order {
        if extra <= 0.0 {
            break;
        }
        let (i, value) = settled[slot];
        let add = (problem.upper[i] - value).min(extra);
        settled[slot].1 = value + add;
        extra -= add;
    }
    settled
}

/// Allocates `total_budget` across `channels` to maximize `Σ e_i ln s_i`.
///
/// Channels without an entry in `constraints` use the default shares of
/// `settings`. The search starts from the current spend proportions. A search
/// that hits the iteration cap while the budget equality still fails is
/// reported as [`MmmError::OptimizerNonConvergence`] with the last iterate.
pub fn optimize_budget_marginal_roi(
    total_budget: f64,
    channels: &[String],
    elasticities: &BTreeMap<String, f64>,
    current_spend: &BTreeMap<String, f64>,
    avg_outcome: f64,
    constraints: &BTreeMap<String, OptimizationConstraint>,
    settings: &OptimizerSettings,
) -> Result<BudgetAllocation, OptimizationFailure> {
    let problem = build_problem(
        total_budget,
        channels,
        elasticities,
        current_spend,
        avg_outcome,
        constraints,
        settings,
    )?;
    debug!(channels = channels.len(), total_budget, "optimizing budget allocation");

    let mut spend = seed_allocation(channels, current_spend, total_budget, &problem);
    let (movable, fixed): (Vec<usize>, Vec<usize>) = (0..channels.len())
        .partition(|&i| problem.elasticity[i] > 0.0 && problem.upper[i] > 0.0);
    let movable_capacity: f64 = movable.iter().map(|&i| problem.upper[i]).sum();
    for (i, value) in settle_fixed(&fixed, movable_capacity, total_budget, &problem) {
        spend[i] = value;
    }
    if !fixed.is_empty() {
        debug!(fixed = fixed.len(), "channels without positive elasticity held at their floor");
    }

    let elasticity: Vec<f64> = movable.iter().map(|&i| problem.elasticity[i]).collect();
    let upper: Vec<f64> = movable.iter().map(|&i| problem.upper[i]).collect();
    let lower: Vec<f64> = movable
        .iter()
        .map(|&i| problem.lower[i].max((POSITIVE_FLOOR * total_budget).min(problem.upper[i])))
        .collect();
    let mut start: Vec<f64> = movable.iter().map(|&i| spend[i]).collect();
    clip(&mut start, &lower, &upper);
    let fixed_total: f64 = fixed.iter().map(|&i| spend[i]).sum();
    let search = Search {
        elasticity: &elasticity,
        lower: &lower,
        upper: &upper,
        target: total_budget - fixed_total,
        step_tolerance: settings.tolerance * total_budget,
        budget_tolerance: settings.budget_tolerance * total_budget,
    };
    let outcome = if movable.is_empty() {
        SearchOutcome {
            spend: Vec::new(),
            iterations: 0,
            converged: true,
        }
    } else {
        search.run(start, settings.max_iterations)
    };
    for (slot, &i) in movable.iter().enumerate() {
        spend[i] = outcome.spend[slot];
    }

    spend.iter_mut().for_each(|v| *v = finite_or_zero(v.max(0.0)));
    let allocated: f64 = spend.iter().sum();
    let budget_gap = (allocated - total_budget).abs();
    if !outcome.converged && budget_gap > settings.budget_tolerance * total_budget {
        warn!(
            iterations = outcome.iterations,
            budget_gap, "optimizer stopped before meeting the budget"
        );
        let best = channels.iter().cloned().zip(spend.iter().copied()).collect();
        return Err(OptimizationFailure {
            error: MmmError::OptimizerNonConvergence(
                ErrorInfo::new("budget-not-met", "iteration cap reached before the budget equality held")
                    .with_context("iterations", outcome.iterations)
                    .with_context("allocated", allocated)
                    .with_context("total_budget", total_budget),
            ),
            best_iterate: Some(best),
        });
    }
    if allocated > 0.0 {
        spend.iter_mut().for_each(|v| *v *= total_budget / allocated);
    }
    if !outcome.converged {
        warn!(iterations = outcome.iterations, "optimizer hit its iteration cap");
    }

    let objective_value = finite_or_zero(objective(&problem.elasticity, &spend));
    info!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        objective = objective_value,
        "budget allocation complete"
    );
    Ok(BudgetAllocation {
        allocation: channels.iter().cloned().zip(spend.iter().copied()).collect(),
        marginal_roi: channels
            .iter()
            .zip(&spend)
            .zip(&problem.elasticity)
            .map(|((c, s), e)| (c.clone(), marginal_roi_loglog(*s, *e, avg_outcome)))
            .collect(),
        iterations: outcome.iterations,
        converged: outcome.converged,
        objective: objective_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn two_channels_split_by_elasticity() {
        let out = optimize_budget_marginal_roi(
            1000.0,
            &names(&["a", "b"]),
            &map(&[("a", 0.2), ("b", 0.1)]),
            &map(&[("a", 500.0), ("b", 500.0)]),
            100.0,
            &BTreeMap::new(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(out.converged);
        assert!((out.allocation["a"] - 2000.0 / 3.0).abs() < 1e-3);
        assert!((out.allocation["b"] - 1000.0 / 3.0).abs() < 1e-3);
        assert!((out.marginal_roi["a"] - out.marginal_roi["b"]).abs() < 1e-6);
    }

    #[test]
    fn dominant_channel_is_capped() {
        let out = optimize_budget_marginal_roi(
            1000.0,
            &names(&["a", "b", "c"]),
            &map(&[("a", 0.9), ("b", 0.01), ("c", 0.01)]),
            &BTreeMap::new(),
            1.0,
            &BTreeMap::new(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!((out.allocation["a"] - 800.0).abs() < 1e-6);
        assert!((out.allocation["b"] - 100.0).abs() < 1e-3);
        assert!((out.allocation["c"] - 100.0).abs() < 1e-3);
    }

    #[test]
    fn non_positive_elasticity_sits_at_floor() {
        let out = optimize_budget_marginal_roi(
            1000.0,
            &names(&["a", "b", "c"]),
            &map(&[("a", 0.3), ("b", 0.1), ("c", -0.2)]),
            &map(&[("a", 100.0), ("b", 100.0), ("c", 800.0)]),
            1.0,
            &BTreeMap::new(),
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!((out.allocation["c"] - 50.0).abs() < 1e-6);
        let total: f64 = out.allocation.values().sum();
        assert!((total - 1000.0).abs() < 1e-6);
        let ratio_a = 0.3 / out.allocation["a"];
        let ratio_b = 0.1 / out.allocation["b"];
        assert!((ratio_a - ratio_b).abs() < 1e-9);
    }

    #[test]
    fn unfunded_channel_grows_under_open_bounds() {
        let open: BTreeMap<String, OptimizationConstraint> = ["c0", "c1", "c2"]
            .iter()
            .map(|c| (c.to_string(), OptimizationConstraint::new(0.0, 1.0)))
            .collect();
        let out = optimize_budget_marginal_roi(
            900.0,
            &names(&["c0", "c1", "c2"]),
            &map(&[("c0", 0.1), ("c1", 0.1), ("c2", 0.1)]),
            &map(&[("c0", 0.0), ("c1", 450.0), ("c2", 450.0)]),
            1.0,
            &open,
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(out.converged);
        for spend in out.allocation.values() {
            assert!((spend - 300.0).abs() < 1e-4, "{:?}", out.allocation);
        }
    }

    #[test]
    fn unfunded_channels_fill_up_to_their_caps() {
        let bounds: BTreeMap<String, OptimizationConstraint> = [
            ("c0".to_string(), OptimizationConstraint::new(0.0, 0.3)),
            ("c1".to_string(), OptimizationConstraint::new(0.0, 0.3)),
            ("c2".to_string(), OptimizationConstraint::new(0.0, 1.0)),
        ]
        .into_iter()
        .collect();
        let out = optimize_budget_marginal_roi(
            1000.0,
            &names(&["c0", "c1", "c2"]),
            &map(&[("c0", 0.2), ("c1", 0.1), ("c2", 0.05)]),
            &map(&[("c0", 0.0), ("c1", 0.0), ("c2", 1000.0)]),
            1.0,
            &bounds,
            &OptimizerSettings::default(),
        )
        .unwrap();
        assert!(out.converged);
        assert!((out.allocation["c0"] - 300.0).abs() < 1e-4, "{:?}", out.allocation);
        assert!((out.allocation["c1"] - 300.0).abs() < 1e-4, "{:?}", out.allocation);
        assert!((out.allocation["c2"] - 400.0).abs() < 1e-4, "{:?}", out.allocation);
    }

    #[test]
    fn infeasible_inputs_are_reported() {
        let channels = names(&["a", "b"]);
        let e = map(&[("a", 0.2), ("b", 0.1)]);
        let settings = OptimizerSettings::default();
        let run = |budget: f64, bounds: &BTreeMap<String, OptimizationConstraint>| {
            optimize_budget_marginal_roi(budget, &channels, &e, &BTreeMap::new(), 1.0, bounds, &settings)
                .unwrap_err()
        };
        let err = run(0.0, &BTreeMap::new());
        assert!(matches!(err.error, MmmError::InfeasibleConstraint(_)));
        assert!(err.best_iterate.is_none());

        let tight: BTreeMap<String, OptimizationConstraint> = [
            ("a".to_string(), OptimizationConstraint::new(0.6, 0.9)),
            ("b".to_string(), OptimizationConstraint::new(0.6, 0.9)),
        ]
        .into_iter()
        .collect();
        assert_eq!(run(100.0, &tight).error.info().code, "min-bounds-exceed-budget");

        let narrow: BTreeMap<String, OptimizationConstraint> = [
            ("a".to_string(), OptimizationConstraint::new(0.1, 0.3)),
            ("b".to_string(), OptimizationConstraint::new(0.1, 0.3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(run(100.0, &narrow).error.info().code, "max-bounds-below-budget");
    }

    #[test]
    fn missing_elasticity_is_invalid() {
        let err = optimize_budget_marginal_roi(
            10.0,
            &names(&["a", "b"]),
            &map(&[("a", 0.2)]),
            &BTreeMap::new(),
            1.0,
            &BTreeMap::new(),
            &OptimizerSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err.error.info().code, "missing-elasticity");
    }
}
