//! Regressors the estimator was fitted on, paired with single coefficient points.

use mmm_core::errors::{ErrorInfo, MmmError};
use mmm_core::numeric::dot;
use mmm_core::types::{CoefficientSampleSet, FeatureBlock, Panel, ParameterDraws};
use mmm_transform::TransformedMedia;
use serde::{Deserialize, Serialize};

fn design_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

/// Log-space design: log media plus the optional baseline regressors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDesign {
    channels: Vec<String>,
    log_media: Vec<Vec<f64>>,
    log_offset: f64,
    trend: Option<Vec<f64>>,
    seasonality: Option<FeatureBlock>,
    events: Option<FeatureBlock>,
    controls: Option<FeatureBlock>,
}

impl ModelDesign {
    /// Creates a design from column-major log media.
    pub fn new(
        channels: Vec<String>,
        log_media: Vec<Vec<f64>>,
        log_offset: f64,
    ) -> Result<Self, MmmError> {
        if channels.is_empty() {
            return Err(design_error("empty-channels", "at least one channel is required"));
        }
        if channels.len() != log_media.len() {
            return Err(design_error(
                "channel-dimension-mismatch",
                "log media columns differ from the channel count",
            )
            .with_context("channels", channels.len())
            .with_context("columns", log_media.len()));
        }
        let periods = log_media[0].len();
        if let Some(idx) = log_media.iter().position(|col| col.len() != periods) {
            return Err(design_error("period-mismatch", "log media columns differ in length")
                .with_context("channel", &channels[idx]));
        }
        Ok(Self {
            channels,
            log_media,
            log_offset,
            trend: None,
            seasonality: None,
            events: None,
            controls: None,
        })
    }

    /// Design of a transformed panel, carrying over the panel's baseline regressors.
    pub fn from_panel(panel: &Panel, media: &TransformedMedia) -> Result<Self, MmmError> {
        if panel.channels() != media.channels.as_slice() {
            return Err(design_error(
                "channel-order-mismatch",
                "transformed media channels differ from the panel",
            ));
        }
        let mut design = Self::new(
            media.channels.clone(),
            media.log_media.clone(),
            media.log_offset,
        )?;
        if let Some(trend) = panel.trend() {
            design = design.with_trend(trend.to_vec())?;
        }
        if let Some(block) = panel.seasonality() {
            design = design.with_seasonality(block.clone())?;
        }
        if let Some(block) = panel.events() {
            design = design.with_events(block.clone())?;
        }
        if let Some(block) = panel.controls() {
            design = design.with_controls(block.clone())?;
        }
        Ok(design)
    }

    fn check_rows(&self, label: &str, rows: usize) -> Result<(), MmmError> {
        if rows != self.n_periods() {
            return Err(design_error(
                "feature-period-mismatch",
                "regressor rows differ from the design period count",
            )
            .with_context("block", label)
            .with_context("expected", self.n_periods())
            .with_context("found", rows));
        }
        Ok(())
    }

    /// Adds a trend regressor.
    pub fn with_trend(mut self, trend: Vec<f64>) -> Result<Self, MmmError> {
        self.check_rows("trend", trend.len())?;
        self.trend = Some(trend);
        Ok(self)
    }

    /// Adds Fourier seasonality columns.
    pub fn with_seasonality(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        self.check_rows("seasonality", block.rows())?;
        self.seasonality = Some(block);
        Ok(self)
    }

    /// Adds event indicator columns.
    pub fn with_events(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        self.check_rows("events", block.rows())?;
        self.events = Some(block);
        Ok(self)
    }

    /// Adds standardized control columns.
    pub fn with_controls(mut self, block: FeatureBlock) -> Result<Self, MmmError> {
        self.check_rows("controls", block.rows())?;
        self.controls = Some(block);
        Ok(self)
    }

    /// Channel names in column order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Column-major log media.
    pub fn log_media(&self) -> &[Vec<f64>] {
        &self.log_media
    }

    /// Offset of the log transform.
    pub fn log_offset(&self) -> f64 {
        self.log_offset
    }

    /// Event block, if any.
    pub fn events(&self) -> Option<&FeatureBlock> {
        self.events.as_ref()
    }

    /// Control block, if any.
    pub fn controls(&self) -> Option<&FeatureBlock> {
        self.controls.as_ref()
    }

    /// Number of periods.
    pub fn n_periods(&self) -> usize {
        self.log_media.first().map(Vec::len).unwrap_or(0)
    }

    /// Checks every coefficient present in `point` matches the width of its regressor.
    pub fn check_point(&self, point: &CoefficientPoint) -> Result<(), MmmError> {
        if point.beta.len() != self.channels.len() {
            return Err(design_error(
                "channel-dimension-mismatch",
                "elasticity dimension differs from the channel count",
            )
            .with_context("channels", self.channels.len())
            .with_context("beta", point.beta.len()));
        }
        let blocks = [
            ("seasonality", &self.seasonality, &point.gamma_fourier),
            ("events", &self.events, &point.gamma_events),
            ("controls", &self.controls, &point.gamma_controls),
        ];
        for (label, block, gamma) in blocks {
            if let (Some(block), Some(gamma)) = (block, gamma) {
                if block.width() != gamma.len() {
                    return Err(design_error(
                        "coefficient-dimension-mismatch",
                        "coefficient dimension differs from its regressor block",
                    )
                    .with_context("block", label)
                    .with_context("columns", block.width())
                    .with_context("coefficients", gamma.len()));
                }
            }
        }
        Ok(())
    }

    /// `β_j · log_media[j][period]` for every channel.
    pub fn media_terms(&self, point: &CoefficientPoint, period: usize) -> Vec<f64> {
        self.log_media
            .iter()
            .zip(&point.beta)
            .map(|(col, beta)| beta * col[period])
            .collect()
    }

    /// Log-space baseline per period: intercept plus every regressor that has both data and a coefficient.
    pub fn baseline_log(&self, point: &CoefficientPoint) -> Vec<f64> {
        (0..self.n_periods())
            .map(|t| {
                let mut value = point.intercept;
                if let (Some(trend), Some(gamma)) = (&self.trend, point.gamma_trend) {
                    value += gamma * trend[t];
                }
                let blocks = [
                    (&self.seasonality, &point.gamma_fourier),
                    (&self.events, &point.gamma_events),
                    (&self.controls, &point.gamma_controls),
                ];
                for (block, gamma) in blocks {
                    if let (Some(block), Some(gamma)) = (block, gamma) {
                        value += dot(block.row(t), gamma);
                    }
                }
                value
            })
            .collect()
    }

    /// Log-space prediction per period.
    pub fn predict_log(&self, point: &CoefficientPoint) -> Vec<f64> {
        self.baseline_log(point)
            .into_iter()
            .enumerate()
            .map(|(t, base)| base + self.media_terms(point, t).iter().sum::<f64>())
            .collect()
    }
}

/// One value per model coefficient: a posterior mean or a single pooled draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientPoint {
    /// Intercept.
    pub intercept: f64,
    /// Per-channel elasticities.
    pub beta: Vec<f64>,
    /// Trend coefficient.
    pub gamma_trend: Option<f64>,
    /// Seasonality coefficients.
    pub gamma_fourier: Option<Vec<f64>>,
    /// Event coefficients.
    pub gamma_events: Option<Vec<f64>>,
    /// Control coefficients.
    pub gamma_controls: Option<Vec<f64>>,
}

impl CoefficientPoint {
    /// Posterior means of every known parameter.
    pub fn posterior_mean(samples: &CoefficientSampleSet) -> Result<Self, MmmError> {
        Self::build(samples, ParameterDraws::means)
    }

    /// The pooled draw `index` (`run * draws + draw`) of every known parameter.
    pub fn draw(samples: &CoefficientSampleSet, index: usize) -> Result<Self, MmmError> {
        if index >= samples.pooled_len() {
            return Err(design_error("draw-out-of-range", "pooled draw index out of range")
                .with_context("index", index)
                .with_context("pooled", samples.pooled_len()));
        }
        Self::build(samples, |draws| draws.draw(index).to_vec())
    }

    fn build<F>(samples: &CoefficientSampleSet, pick: F) -> Result<Self, MmmError>
    where
        F: Fn(&ParameterDraws) -> Vec<f64>,
    {
        let intercept = pick(samples.require(CoefficientSampleSet::INTERCEPT)?)
            .first()
            .copied()
            .unwrap_or(0.0);
        let beta = pick(samples.require(CoefficientSampleSet::BETA)?);
        let optional = |name: &str| samples.get(name).map(&pick);
        Ok(Self {
            intercept,
            beta,
            gamma_trend: optional(CoefficientSampleSet::GAMMA_TREND)
                .and_then(|v| v.first().copied()),
            gamma_fourier: optional(CoefficientSampleSet::GAMMA_FOURIER),
            gamma_events: optional(CoefficientSampleSet::GAMMA_EVENTS),
            gamma_controls: optional(CoefficientSampleSet::GAMMA_CONTROLS),
        })
    }
}
