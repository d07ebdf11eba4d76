use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MmmError};
use crate::numeric::mean;

fn panel_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

/// Named block of row-major features (`values[period][column]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureBlock {
    /// Column labels.
    pub names: Vec<String>,
    /// Row-major values, one row per period.
    pub values: Vec<Vec<f64>>,
}

impl FeatureBlock {
    /// Creates a block after checking every row carries one value per name.
    pub fn new(names: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self, MmmError> {
        let block = Self { names, values };
        block.check_width()?;
        Ok(block)
    }

    /// Builds a block from column vectors (all of equal length).
    pub fn from_columns(names: Vec<String>, columns: &[Vec<f64>]) -> Result<Self, MmmError> {
        if names.len() != columns.len() {
            return Err(panel_error(
                "feature-width-mismatch",
                "feature names and columns differ in length",
            )
            .with_context("names", names.len())
            .with_context("columns", columns.len()));
        }
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        if columns.iter().any(|col| col.len() != rows) {
            return Err(panel_error(
                "feature-length-mismatch",
                "feature columns must share one length",
            ));
        }
        let values = (0..rows)
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect();
        Ok(Self { names, values })
    }

    /// Number of rows (periods).
    pub fn rows(&self) -> usize {
        self.values.len()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Returns the `idx`-th column as an owned vector.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[idx]).collect()
    }

    /// Returns the row for `period`.
    pub fn row(&self, period: usize) -> &[f64] {
        &self.values[period]
    }

    fn check_width(&self) -> Result<(), MmmError> {
        for (period, row) in self.values.iter().enumerate() {
            if row.len() != self.names.len() {
                return Err(panel_error(
                    "feature-width-mismatch",
                    "feature row width differs from the number of names",
                )
                .with_context("period", period)
                .with_context("expected", self.names.len())
                .with_context("found", row.len()));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(panel_error("feature-non-finite", "feature values must be finite")
                    .with_context("period", period));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct PanelRecord {
    channels: Vec<String>,
    y: Vec<f64>,
    spend: Vec<Vec<f64>>,
    #[serde(default)]
    controls: Option<FeatureBlock>,
    #[serde(default)]
    events: Option<FeatureBlock>,
    #[serde(default)]
    trend: Option<Vec<f64>>,
    #[serde(default)]
    seasonality: Option<FeatureBlock>,
}

/// Ordered sequence of periods with outcome, media spend and optional covariates.
///
/// A panel is validated once at construction and never mutated afterwards;
/// engines borrow it immutably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PanelRecord")]
pub struct Panel {
    channels: Vec<String>,
    y: Vec<f64>,
    spend: Vec<Vec<f64>>,
    controls: Option<FeatureBlock>,
    events: Option<FeatureBlock>,
    trend: Option<Vec<f64>>,
    seasonality: Option<FeatureBlock>,
}

impl TryFrom<PanelRecord> for Panel {
    type Error = MmmError;

    fn try_from(record: PanelRecord) -> Result<Self, Self::Error> {
        let mut panel = Panel::new(record.channels, record.y, record.spend)?;
        if let Some(block) = record.controls {
            panel = panel.with_controls(block)?;
        }
        if let Some(block) = record.events {
            panel = panel.with_events(block)?;
        }
        if let Some(trend) = record.trend {
            panel = panel.with_trend(trend)?;
        }
        if let Some(block) = record.seasonality {
            panel = panel.with_seasonality(block)?;
        }
        Ok(panel)
    }
}

impl Panel {
    /// Builds a panel from channel names, outcome vector and row-major spend matrix.
    pub fn new(channels: Vec<String>, y: Vec<f64>, spend: Vec<Vec<f64>>) -> Result<Self, MmmError> {
        if channels.is_empty() {
            return Err(panel_error("empty-channels", "at least one channel is required"));
        }
        let unique: BTreeSet<&String> = channels.iter().collect();
        if unique.len() != channels.len() {
            return Err(panel_error("duplicate-channel", "channel names must be unique"));
        }
        if y.len() != spend.len() {
            return Err(
                panel_error("period-mismatch", "outcome and spend differ in period count")
                    .with_context("y", y.len())
                    .with_context("spend", spend.len()),
            );
        }
        if let Some(period) = y.iter().position(|v| !(v.is_finite() && *v > 0.0)) {
            return Err(panel_error("non-positive-outcome", "outcome values must be > 0")
                .with_context("period", period));
        }
        for (period, row) in spend.iter().enumerate() {
            if row.len() != channels.len() {
                return Err(panel_error(
                    "channel-width-mismatch",
                    "spend row width differs from channel count",
                )
                .with_context("period", period)
                .with_context("expected", channels.len())
                .with_context("found", row.len()));
            }
            if let Some(col) = row.iter().position(|v| !(v.is_finite() && *v >= 0.0)) {
                return Err(panel_error("negative-spend", "spend values must be finite and >= 0")
                    .with_context("period", period)
                    .with_context("channel", &channels[col]));
            }
        }
        Ok(Self {
            channels,
            y,
            spend,
            controls: None,
            events: None,
            trend: None,
            seasonality: None,
        })
    }

    fn check_rows(&self, label: &str, rows: usize) -> Result<(), MmmError> {
        if rows != self.n_periods() {
            return Err(panel_error(
                "feature-period-mismatch",
                "covariate rows differ from the panel period count",
            )
            .with_context("block", label)
            .with_context("expected", self.n_periods())
            .with_context("found", rows));
        }
        Ok(())
    }

    /// Attaches a control block (row count must equal the period count).
    pub fn with_controls(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        block.check_width()?;
        self.check_rows("controls", block.rows())?;
        self.controls = Some(block);
        Ok(self)
    }

    /// Attaches an event-indicator block.
    pub fn with_events(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        block.check_width()?;
        self.check_rows("events", block.rows())?;
        self.events = Some(block);
        Ok(self)
    }

    /// Attaches a trend vector.
    pub fn with_trend(mut self, trend: Vec<f64>) -> Result<Self, MmmError> {
        self.check_rows("trend", trend.len())?;
        if trend.iter().any(|v| !v.is_finite()) {
            return Err(panel_error("feature-non-finite", "trend values must be finite"));
        }
        self.trend = Some(trend);
        Ok(self)
    }

    /// Attaches a seasonality feature block.
    pub fn with_seasonality(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        block.check_width()?;
        self.check_rows("seasonality", block.rows())?;
        self.seasonality = Some(block);
        Ok(self)
    }

    /// Channel names in column order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Outcome vector.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Row-major spend matrix.
    pub fn spend(&self) -> &[Vec<f64>] {
        &self.spend
    }

    /// Optional control block.
    pub fn controls(&self) -> Option<&FeatureBlock> {
        self.controls.as_ref()
    }

    /// Optional event block.
    pub fn events(&self) -> Option<&FeatureBlock> {
        self.events.as_ref()
    }

    /// Optional trend vector.
    pub fn trend(&self) -> Option<&[f64]> {
        self.trend.as_deref()
    }

    /// Optional seasonality block.
    pub fn seasonality(&self) -> Option<&FeatureBlock> {
        self.seasonality.as_ref()
    }

    /// Number of periods.
    pub fn n_periods(&self) -> usize {
        self.y.len()
    }

    /// Number of channels.
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Column index of a channel.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }

    /// Raw spend column for channel `idx`.
    pub fn channel_column(&self, idx: usize) -> Vec<f64> {
        self.spend.iter().map(|row| row[idx]).collect()
    }

    /// Total raw spend per channel over all periods.
    pub fn total_spend_by_channel(&self) -> BTreeMap<String, f64> {
        self.channels
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), self.channel_column(idx).iter().sum()))
            .collect()
    }

    /// Mean raw spend per channel.
    pub fn mean_spend_by_channel(&self) -> BTreeMap<String, f64> {
        self.channels
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), mean(&self.channel_column(idx))))
            .collect()
    }

    /// Mean outcome.
    pub fn mean_outcome(&self) -> f64 {
        mean(&self.y)
    }

    /// Total outcome.
    pub fn total_outcome(&self) -> f64 {
        self.y.iter().sum()
    }
}

/// Hill saturation parameters for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationParams {
    /// Half-saturation spend in raw spend units.
    #[serde(rename = "K", alias = "k")]
    pub k: f64,
    /// Steepness.
    #[serde(rename = "S", alias = "s")]
    pub s: f64,
}

impl SaturationParams {
    /// Accepted steepness range.
    pub const STEEPNESS_RANGE: (f64, f64) = (0.5, 5.0);

    /// Checks `K > 0` and `S` within [`Self::STEEPNESS_RANGE`].
    pub fn validate(&self) -> Result<(), MmmError> {
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(panel_error("non-positive-k", "half-saturation K must be > 0")
                .with_context("K", self.k));
        }
        let (lo, hi) = Self::STEEPNESS_RANGE;
        if !(self.s.is_finite() && (lo..=hi).contains(&self.s)) {
            return Err(panel_error("steepness-out-of-range", "steepness S must lie in [0.5, 5]")
                .with_context("S", self.s));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_decay_rate() -> f64 {
    0.3
}

/// Per-channel transform configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelTransformConfig {
    /// Whether adstock is applied.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Geometric decay in `[0, 1)`.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Optional Hill saturation; `None` disables it.
    #[serde(default)]
    pub saturation: Option<SaturationParams>,
}

impl Default for ChannelTransformConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            decay_rate: default_decay_rate(),
            saturation: None,
        }
    }
}

impl ChannelTransformConfig {
    /// Validates the decay range and the saturation parameters.
    pub fn validate(&self, channel: &str) -> Result<(), MmmError> {
        if !(self.decay_rate.is_finite() && (0.0..1.0).contains(&self.decay_rate)) {
            return Err(panel_error("decay-out-of-range", "decay rate must lie in [0, 1)")
                .with_context("channel", channel)
                .with_context("decay_rate", self.decay_rate));
        }
        if let Some(params) = &self.saturation {
            params.validate().map_err(|err| err.with_context("channel", channel))?;
        }
        Ok(())
    }

    /// Decay actually applied: zero when adstock is disabled.
    pub fn effective_decay(&self) -> f64 {
        if self.enabled {
            self.decay_rate
        } else {
            0.0
        }
    }
}

/// Draws for one named parameter, flattened as `[run][draw][component]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterDrawsRecord")]
pub struct ParameterDraws {
    runs: usize,
    draws: usize,
    dim: usize,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct ParameterDrawsRecord {
    runs: usize,
    draws: usize,
    dim: usize,
    values: Vec<f64>,
}

impl TryFrom<ParameterDrawsRecord> for ParameterDraws {
    type Error = MmmError;

    fn try_from(record: ParameterDrawsRecord) -> Result<Self, Self::Error> {
        ParameterDraws::new(record.runs, record.draws, record.dim, record.values)
    }
}

impl ParameterDraws {
    /// Builds a draw array; `values.len()` must equal `runs * draws * dim`.
    pub fn new(runs: usize, draws: usize, dim: usize, values: Vec<f64>) -> Result<Self, MmmError> {
        if runs == 0 || draws == 0 || dim == 0 {
            return Err(panel_error("empty-draws", "runs, draws and dim must be positive")
                .with_context("runs", runs)
                .with_context("draws", draws)
                .with_context("dim", dim));
        }
        if values.len() != runs * draws * dim {
            return Err(panel_error("draw-shape-mismatch", "draw values do not match the shape")
                .with_context("expected", runs * draws * dim)
                .with_context("found", values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(panel_error("draw-non-finite", "draw values must be finite"));
        }
        Ok(Self {
            runs,
            draws,
            dim,
            values,
        })
    }

    /// Builds a draw array from nested `[run][draw][component]` vectors.
    pub fn from_nested(nested: Vec<Vec<Vec<f64>>>) -> Result<Self, MmmError> {
        let runs = nested.len();
        let draws = nested.first().map(Vec::len).unwrap_or(0);
        let dim = nested
            .first()
            .and_then(|run| run.first())
            .map(Vec::len)
            .unwrap_or(0);
        let mut values = Vec::with_capacity(runs * draws * dim);
        for run in &nested {
            if run.len() != draws {
                return Err(panel_error("ragged-draws", "every run needs the same draw count"));
            }
            for draw in run {
                if draw.len() != dim {
                    return Err(panel_error("ragged-draws", "every draw needs the same dimension"));
                }
                values.extend_from_slice(draw);
            }
        }
        Self::new(runs, draws, dim, values)
    }

    /// Builds a scalar parameter from `[run][draw]` values.
    pub fn scalar(nested: Vec<Vec<f64>>) -> Result<Self, MmmError> {
        Self::from_nested(
            nested
                .into_iter()
                .map(|run| run.into_iter().map(|v| vec![v]).collect())
                .collect(),
        )
    }

    /// Number of simulation runs (chains).
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Draws per run.
    pub fn draws(&self) -> usize {
        self.draws
    }

    /// Parameter dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Total pooled draw count (`runs * draws`).
    pub fn pooled_len(&self) -> usize {
        self.runs * self.draws
    }

    /// Component vector of the pooled draw `index` (`run * draws + draw`).
    pub fn draw(&self, index: usize) -> &[f64] {
        let start = index * self.dim;
        &self.values[start..start + self.dim]
    }

    /// Every draw of `component`, pooled across runs.
    pub fn pooled(&self, component: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(component)
            .step_by(self.dim)
            .copied()
            .collect()
    }

    /// Draws of `component` within a single run.
    pub fn run_component(&self, run: usize, component: usize) -> Vec<f64> {
        let start = run * self.draws;
        (start..start + self.draws)
            .map(|idx| self.values[idx * self.dim + component])
            .collect()
    }

    /// Posterior mean per component.
    pub fn means(&self) -> Vec<f64> {
        (0..self.dim).map(|c| mean(&self.pooled(c))).collect()
    }
}

/// Estimator-reported sampling statistics that cannot be recovered from draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EstimatorDiagnostics {
    /// Number of divergent transitions reported by the estimator.
    #[serde(default)]
    pub divergences: u64,
}

#[derive(Deserialize)]
struct SampleSetRecord {
    parameters: BTreeMap<String, ParameterDraws>,
    #[serde(default)]
    diagnostics: EstimatorDiagnostics,
}

/// Coefficient distribution produced by the external estimator.
///
/// Every parameter shares one `(runs, draws)` pair. Per-channel parameters keep
/// the channel order used to build the [`Panel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "SampleSetRecord")]
pub struct CoefficientSampleSet {
    parameters: BTreeMap<String, ParameterDraws>,
    diagnostics: EstimatorDiagnostics,
}

impl TryFrom<SampleSetRecord> for CoefficientSampleSet {
    type Error = MmmError;

    fn try_from(record: SampleSetRecord) -> Result<Self, Self::Error> {
        let mut set = CoefficientSampleSet::new();
        for (name, draws) in record.parameters {
            set.insert(name, draws)?;
        }
        set.diagnostics = record.diagnostics;
        Ok(set)
    }
}

impl CoefficientSampleSet {
    /// Well-known name of the intercept parameter.
    pub const INTERCEPT: &'static str = "intercept";
    /// Well-known name of the per-channel elasticity parameter.
    pub const BETA: &'static str = "beta";
    /// Well-known name of the trend coefficient.
    pub const GAMMA_TREND: &'static str = "gamma_trend";
    /// Well-known name of the seasonality coefficients.
    pub const GAMMA_FOURIER: &'static str = "gamma_fourier";
    /// Well-known name of the event coefficients.
    pub const GAMMA_EVENTS: &'static str = "gamma_events";
    /// Well-known name of the control coefficients.
    pub const GAMMA_CONTROLS: &'static str = "gamma_controls";

    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, rejecting a `(runs, draws)` shape that differs from the set's.
    pub fn insert(&mut self, name: impl Into<String>, draws: ParameterDraws) -> Result<(), MmmError> {
        let name = name.into();
        if let Some((runs, per_run)) = self.shape() {
            if draws.runs() != runs || draws.draws() != per_run {
                return Err(panel_error(
                    "sample-shape-mismatch",
                    "all parameters must share the same run and draw counts",
                )
                .with_context("parameter", &name)
                .with_context("expected", format!("{runs}x{per_run}"))
                .with_context("found", format!("{}x{}", draws.runs(), draws.draws())));
            }
        }
        self.parameters.insert(name, draws);
        Ok(())
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, name: impl Into<String>, draws: ParameterDraws) -> Result<Self, MmmError> {
        self.insert(name, draws)?;
        Ok(self)
    }

    /// Attaches estimator diagnostics.
    pub fn with_diagnostics(mut self, diagnostics: EstimatorDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Shared `(runs, draws)` pair, `None` for an empty set.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.parameters
            .values()
            .next()
            .map(|draws| (draws.runs(), draws.draws()))
    }

    /// Looks up a parameter.
    pub fn get(&self, name: &str) -> Option<&ParameterDraws> {
        self.parameters.get(name)
    }

    /// Looks up a parameter, failing with `missing-parameter` when absent.
    pub fn require(&self, name: &str) -> Result<&ParameterDraws, MmmError> {
        self.parameters.get(name).ok_or_else(|| {
            panel_error("missing-parameter", "coefficient samples lack a required parameter")
                .with_context("parameter", name)
        })
    }

    /// Posterior mean vector of a parameter.
    pub fn mean_vector(&self, name: &str) -> Option<Vec<f64>> {
        self.parameters.get(name).map(ParameterDraws::means)
    }

    /// Posterior mean of the first component of a parameter.
    pub fn scalar_mean(&self, name: &str) -> Option<f64> {
        self.mean_vector(name).and_then(|v| v.first().copied())
    }

    /// Iterates parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDraws)> {
        self.parameters.iter()
    }

    /// Estimator-reported diagnostics.
    pub fn diagnostics(&self) -> EstimatorDiagnostics {
        self.diagnostics
    }

    /// Total pooled draws (`runs * draws`).
    pub fn pooled_len(&self) -> usize {
        self.shape().map(|(r, d)| r * d).unwrap_or(0)
    }
}
