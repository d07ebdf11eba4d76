//! Shapley attribution over an additive channel value function.
//!
//! Small games are solved exactly by enumerating coalitions as bitmasks. Larger
//! games use Monte Carlo permutation sampling split into fixed-size chunks; each
//! chunk draws from its own seed substream and the chunk sums are combined in
//! chunk order, so results only depend on the master seed.

use std::collections::{BTreeMap, BTreeSet};

use mmm_core::config::AttributionSettings;
use mmm_core::errors::MmmError;
use mmm_core::numeric::{finite_or_zero, ratio_or_zero};
use mmm_core::rng::{shapley_chunk_seed, RngHandle};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower bound on the number of sampled permutations.
pub const MIN_PERMUTATIONS: usize = 1000;
const CHUNK_PERMUTATIONS: usize = 250;

/// How a Shapley allocation was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapleyMethod {
    /// Full coalition enumeration.
    Exact,
    /// Monte Carlo average over random permutations.
    Sampled {
        /// Number of permutations averaged.
        permutations: usize,
        /// Master seed of the permutation stream.
        seed: u64,
    },
}

/// Shapley value per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyAllocation {
    /// Value per channel.
    pub values: BTreeMap<String, f64>,
    /// Method used.
    pub method: ShapleyMethod,
}

impl ShapleyAllocation {
    /// Sum of all values.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }
}

fn check_effects(effects: &[(String, f64)]) -> Result<(), MmmError> {
    let mut seen = BTreeSet::new();
    for (channel, effect) in effects {
        if !seen.insert(channel.as_str()) {
            return Err(MmmError::invalid("duplicate-channel", "channel listed twice")
                .with_context("channel", channel));
        }
        if !effect.is_finite() {
            return Err(MmmError::invalid("non-finite-effect", "channel effect must be finite")
                .with_context("channel", channel));
        }
    }
    Ok(())
}

/// Shapley values of `v(S) = baseline + Σ_{i∈S} effect_i`.
///
/// Exact for up to `settings.shapley_exact_max_channels` channels, otherwise
/// sampled with at least [`MIN_PERMUTATIONS`] permutations seeded from `seed`.
/// An empty effect list yields an empty exact allocation.
pub fn compute_shapley_values(
    baseline: f64,
    effects: &[(String, f64)],
    settings: &AttributionSettings,
    seed: u64,
) -> Result<ShapleyAllocation, MmmError> {
    check_effects(effects)?;
    let value = |coalition: &[usize]| -> f64 {
        baseline + coalition.iter().map(|&i| effects[i].1).sum::<f64>()
    };
    let n = effects.len();
    let (raw, method) = if n <= settings.shapley_exact_max_channels.min(20) {
        (exact_shapley(n, value), ShapleyMethod::Exact)
    } else {
        let permutations = settings.shapley_permutations.max(MIN_PERMUTATIONS);
        (
            sampled_shapley(n, value, permutations, seed),
            ShapleyMethod::Sampled { permutations, seed },
        )
    };
    debug!(channels = n, ?method, "computed shapley values");
    let values = effects
        .iter()
        .zip(raw)
        .map(|((channel, _), v)| (channel.clone(), finite_or_zero(v)))
        .collect();
    Ok(ShapleyAllocation { values, method })
}

fn factorials(n: usize) -> Vec<f64> {
    let mut table = vec![1.0; n + 1];
    for k in 1..=n {
        table[k] = table[k - 1] * k as f64;
    }
    table
}

/// Exact Shapley values for an `n`-player game given as a coalition value function.
pub fn exact_shapley<V>(n: usize, value: V) -> Vec<f64>
where
    V: Fn(&[usize]) -> f64,
{
    if n == 0 {
        return Vec::new();
    }
    let masks = 1usize << n;
    let members = |mask: usize| -> Vec<usize> { (0..n).filter(|i| mask & (1 << i) != 0).collect() };
    let values: Vec<f64> = (0..masks).map(|mask| value(&members(mask))).collect();
    let fact = factorials(n);
    let weights: Vec<f64> = (0..n)
        .map(|size| fact[size] * fact[n - size - 1] / fact[n])
        .collect();

    (0..n)
        .map(|player| {
            let bit = 1usize << player;
            (0..masks)
                .filter(|mask| mask & bit == 0)
                .map(|mask| weights[mask.count_ones() as usize] * (values[mask | bit] - values[mask]))
                .sum()
        })
        .collect()
}

/// Monte Carlo Shapley values from `permutations` random orderings.
pub fn sampled_shapley<V>(n: usize, value: V, permutations: usize, seed: u64) -> Vec<f64>
where
    V: Fn(&[usize]) -> f64 + Sync,
{
    if n == 0 || permutations == 0 {
        return vec![0.0; n];
    }
    let chunks = permutations.div_ceil(CHUNK_PERMUTATIONS);
    let partials: Vec<Vec<f64>> = (0..chunks)
        .into_par_iter()
        .map(|chunk| {
            let count = CHUNK_PERMUTATIONS.min(permutations - chunk * CHUNK_PERMUTATIONS);
            let mut rng = RngHandle::from_seed(shapley_chunk_seed(seed, chunk));
            let mut order: Vec<usize> = (0..n).collect();
            let mut sums = vec![0.0; n];
            for _ in 0..count {
                order.shuffle(&mut rng);
                let mut previous = value(&[]);
                for prefix in 1..=n {
                    let current = value(&order[..prefix]);
                    sums[order[prefix - 1]] += current - previous;
                    previous = current;
                }
            }
            sums
        })
        .collect();
    let mut totals = vec![0.0; n];
    for partial in partials {
        for (total, value) in totals.iter_mut().zip(partial) {
            *total += value;
        }
    }
    totals
        .into_iter()
        .map(|total| total / permutations as f64)
        .collect()
}

/// One row of the Shapley share table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapleyRow {
    /// Channel name.
    pub channel: String,
    /// Shapley value.
    pub shapley_value: f64,
    /// Percentage of the summed Shapley values; 0 when that sum is not positive.
    pub share_pct: f64,
    /// Direct (decomposition) contribution.
    pub direct_contribution: f64,
}

/// Share table in `order`; channels missing from either map read as 0.
pub fn shapley_table(
    allocation: &ShapleyAllocation,
    direct: &BTreeMap<String, f64>,
    order: &[String],
) -> Vec<ShapleyRow> {
    let total = allocation.total();
    order
        .iter()
        .map(|channel| {
            let value = allocation.values.get(channel).copied().unwrap_or(0.0);
            ShapleyRow {
                channel: channel.clone(),
                shapley_value: value,
                share_pct: ratio_or_zero(value, total) * 100.0,
                direct_contribution: direct.get(channel).copied().unwrap_or(0.0),
            }
        })
        .collect()
}
