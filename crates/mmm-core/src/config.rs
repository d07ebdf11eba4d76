use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MmmError};
use crate::serde::from_yaml_slice;
use crate::types::ChannelTransformConfig;

/// YAML-configurable parameters for a full engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Media transformation settings.
    #[serde(default)]
    pub transform: TransformSettings,
    /// Attribution settings.
    #[serde(default)]
    pub attribution: AttributionSettings,
    /// Budget optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    /// Convergence thresholds applied to estimator output.
    #[serde(default)]
    pub diagnostics: ConvergenceThresholds,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

impl EngineConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(data: &str) -> Result<Self, MmmError> {
        let config: Self = from_yaml_slice(data.as_bytes())?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every channel config and the numeric settings.
    pub fn validate(&self) -> Result<(), MmmError> {
        for (channel, config) in &self.transform.channels {
            config.validate(channel)?;
        }
        if !(self.transform.log_offset.is_finite() && self.transform.log_offset > 0.0) {
            return Err(MmmError::invalid("log-offset", "log offset must be > 0")
                .with_context("log_offset", self.transform.log_offset));
        }
        let attr = &self.attribution;
        if !(0.0..=100.0).contains(&attr.ci_lower_pct)
            || !(0.0..=100.0).contains(&attr.ci_upper_pct)
            || attr.ci_lower_pct >= attr.ci_upper_pct
        {
            return Err(MmmError::invalid(
                "ci-percentiles",
                "credible interval percentiles must satisfy 0 <= lower < upper <= 100",
            ));
        }
        if attr.response_points < 2 {
            return Err(MmmError::invalid(
                "response-points",
                "response curves need at least two points",
            ));
        }
        let opt = &self.optimizer;
        if !(0.0..=1.0).contains(&opt.default_min_fraction)
            || !(0.0..=1.0).contains(&opt.default_max_fraction)
            || opt.default_min_fraction > opt.default_max_fraction
        {
            return Err(MmmError::invalid(
                "default-fractions",
                "default budget fractions must satisfy 0 <= min <= max <= 1",
            ));
        }
        if opt.max_iterations == 0 {
            return Err(MmmError::invalid(
                "max-iterations",
                "optimizer needs at least one iteration",
            ));
        }
        Ok(())
    }

    /// Transform config for `channel`, falling back to the adstock-only default.
    pub fn channel_transform(&self, channel: &str) -> ChannelTransformConfig {
        self.transform
            .channels
            .get(channel)
            .copied()
            .unwrap_or_default()
    }
}

/// Loads and validates an [`EngineConfig`] from a YAML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, MmmError> {
    let data = fs::read_to_string(path).map_err(|err| {
        MmmError::Serde(
            ErrorInfo::new("config-read", "failed to read engine config")
                .with_context("path", path.display())
                .with_hint(err.to_string()),
        )
    })?;
    EngineConfig::from_yaml_str(&data)
}

/// Media transformation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Multiply adstocked series by `1 - decay`.
    #[serde(default = "default_true")]
    pub normalize_adstock: bool,
    /// Divide each adstocked column by its mean before saturation.
    #[serde(default = "default_true")]
    pub scale_by_mean: bool,
    /// Offset used by the log transform.
    #[serde(default = "default_log_offset")]
    pub log_offset: f64,
    /// Per-channel configuration; missing channels use the default.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelTransformConfig>,
}

fn default_true() -> bool {
    true
}

fn default_log_offset() -> f64 {
    1.0
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            normalize_adstock: true,
            scale_by_mean: true,
            log_offset: default_log_offset(),
            channels: BTreeMap::new(),
        }
    }
}

/// Attribution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionSettings {
    /// Lower percentile of the elasticity credible interval.
    #[serde(default = "default_ci_lower")]
    pub ci_lower_pct: f64,
    /// Upper percentile of the elasticity credible interval.
    #[serde(default = "default_ci_upper")]
    pub ci_upper_pct: f64,
    /// Largest channel count solved with exact Shapley enumeration.
    #[serde(default = "default_exact_max")]
    pub shapley_exact_max_channels: usize,
    /// Permutations sampled by the Monte Carlo Shapley approximation (at least 1000 are used).
    #[serde(default = "default_permutations")]
    pub shapley_permutations: usize,
    /// Grid points per response curve.
    #[serde(default = "default_response_points")]
    pub response_points: usize,
    /// Draws used for posterior predictive intervals.
    #[serde(default = "default_predictive_draws")]
    pub predictive_draws: usize,
    /// Lower percentile of the posterior predictive band.
    #[serde(default = "default_predictive_lower")]
    pub predictive_lower_pct: f64,
    /// Upper percentile of the posterior predictive band.
    #[serde(default = "default_predictive_upper")]
    pub predictive_upper_pct: f64,
}

fn default_ci_lower() -> f64 {
    3.0
}

fn default_ci_upper() -> f64 {
    97.0
}

fn default_exact_max() -> usize {
    10
}

fn default_permutations() -> usize {
    1000
}

fn default_response_points() -> usize {
    50
}

fn default_predictive_draws() -> usize {
    500
}

fn default_predictive_lower() -> f64 {
    5.0
}

fn default_predictive_upper() -> f64 {
    95.0
}

impl Default for AttributionSettings {
    fn default() -> Self {
        Self {
            ci_lower_pct: default_ci_lower(),
            ci_upper_pct: default_ci_upper(),
            shapley_exact_max_channels: default_exact_max(),
            shapley_permutations: default_permutations(),
            response_points: default_response_points(),
            predictive_draws: default_predictive_draws(),
            predictive_lower_pct: default_predictive_lower(),
            predictive_upper_pct: default_predictive_upper(),
        }
    }
}

/// Budget optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Minimum share of budget per channel without an explicit constraint.
    #[serde(default = "default_min_fraction")]
    pub default_min_fraction: f64,
    /// Maximum share of budget per channel without an explicit constraint.
    #[serde(default = "default_max_fraction")]
    pub default_max_fraction: f64,
    /// Iteration cap of the constrained search.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Relative step tolerance used as the convergence criterion.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Relative tolerance on the budget equality.
    #[serde(default = "default_budget_tolerance")]
    pub budget_tolerance: f64,
}

fn default_min_fraction() -> f64 {
    0.05
}

fn default_max_fraction() -> f64 {
    0.80
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_budget_tolerance() -> f64 {
    1e-6
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            default_min_fraction: default_min_fraction(),
            default_max_fraction: default_max_fraction(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            budget_tolerance: default_budget_tolerance(),
        }
    }
}

/// Convergence thresholds for estimator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceThresholds {
    /// Converged when the largest R-hat is strictly below this value.
    #[serde(default = "default_max_rhat")]
    pub max_rhat: f64,
    /// Converged when the smallest ESS is strictly above this value.
    #[serde(default = "default_min_ess")]
    pub min_ess: f64,
    /// Converged when the divergence count does not exceed this value.
    #[serde(default)]
    pub max_divergences: u64,
}

fn default_max_rhat() -> f64 {
    1.05
}

fn default_min_ess() -> f64 {
    100.0
}

impl Default for ConvergenceThresholds {
    fn default() -> Self {
        Self {
            max_rhat: default_max_rhat(),
            min_ess: default_min_ess(),
            max_divergences: 0,
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for every sampling-based computation.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded next to the seed in reports.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    42
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
