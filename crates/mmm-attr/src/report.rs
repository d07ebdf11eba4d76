//! End-to-end attribution over a transformed panel and estimator draws.

use std::collections::BTreeMap;

use mmm_core::config::EngineConfig;
use mmm_core::errors::MmmError;
use mmm_core::hash::stable_hash_string;
use mmm_core::provenance::RunProvenance;
use mmm_core::types::{CoefficientSampleSet, Panel, SaturationParams};
use mmm_transform::TransformedMedia;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::contributions::{compute_channel_contributions, ChannelContribution};
use crate::decompose::{decompose, DecompositionTable};
use crate::design::{CoefficientPoint, ModelDesign};
use crate::diagnostics::{convergence_diagnostics, ConvergenceReport};
use crate::fit::{fit_metrics, residual_analysis, FitMetrics, HoldoutMetrics, ResidualAnalysis};
use crate::predictive::{
    coefficient_summaries, posterior_predictive, predict, predict_log, CoefficientSummary,
    PredictiveBand,
};
use crate::response::{compute_response_curves, CurveInputs, ResponseCurve};
use crate::roi::{calculate_roi, RoiRecord};
use crate::shapley::{compute_shapley_values, shapley_table, ShapleyAllocation, ShapleyRow};

/// Transform parameters applied before estimation, echoed in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSummary {
    /// Decay rate per channel.
    pub decay_rates: BTreeMap<String, f64>,
    /// Saturation parameters per channel.
    pub saturation: BTreeMap<String, Option<SaturationParams>>,
    /// Scaling mean per channel.
    pub means: BTreeMap<String, f64>,
}

/// Everything the attribution engine derives from one estimator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    /// Input hash, seed and tool versions.
    pub provenance: RunProvenance,
    /// Elasticity and log-space contribution summaries.
    pub contributions: Vec<ChannelContribution>,
    /// Per-period decomposition.
    pub decomposition: DecompositionTable,
    /// ROI on total spend and decomposition totals.
    pub roi: Vec<RoiRecord>,
    /// Response curve per channel.
    pub response_curves: BTreeMap<String, ResponseCurve>,
    /// Shapley values over decomposition totals.
    pub shapley: ShapleyAllocation,
    /// Shapley share table in channel order.
    pub shapley_table: Vec<ShapleyRow>,
    /// Convergence checks on the draws.
    pub diagnostics: ConvergenceReport,
    /// In-sample fit.
    pub fit: FitMetrics,
    /// Residual checks.
    pub residuals: ResidualAnalysis,
    /// Posterior predictive band.
    pub posterior_predictive: PredictiveBand,
    /// Event coefficient summaries, when events were modelled.
    pub event_coefficients: Option<Vec<CoefficientSummary>>,
    /// Control coefficient summaries, when controls were modelled.
    pub control_coefficients: Option<Vec<CoefficientSummary>>,
    /// Holdout accuracy, filled by callers that hold out periods.
    #[serde(default)]
    pub holdout: Option<HoldoutMetrics>,
    /// Transform parameters used.
    pub transforms: TransformSummary,
}

#[derive(Serialize)]
struct HashInput<'a> {
    panel: &'a Panel,
    samples: &'a CoefficientSampleSet,
    config: &'a EngineConfig,
}

fn labelled_summaries(
    samples: &CoefficientSampleSet,
    parameter: &str,
    labels: Option<&[String]>,
) -> Result<Option<Vec<CoefficientSummary>>, MmmError> {
    match (samples.get(parameter), labels) {
        (Some(_), Some(labels)) if !labels.is_empty() => {
            coefficient_summaries(samples, parameter, labels).map(Some)
        }
        _ => Ok(None),
    }
}

/// Runs every attribution step for `panel`, whose media were transformed into `media`.
pub fn attribute(
    panel: &Panel,
    media: &TransformedMedia,
    samples: &CoefficientSampleSet,
    config: &EngineConfig,
) -> Result<AttributionReport, MmmError> {
    let seed = config.seed_policy.master_seed;
    let input_hash = stable_hash_string(&HashInput {
        panel,
        samples,
        config,
    })?;
    info!(%input_hash, seed, channels = panel.n_channels(), "running attribution");

    let design = ModelDesign::from_panel(panel, media)?;
    let channels = panel.channels();
    let settings = &config.attribution;

    let contributions = compute_channel_contributions(
        samples,
        design.log_media(),
        panel.mean_outcome(),
        channels,
        settings,
    )?;
    let decomposition = decompose(&design, samples, panel.y())?;
    let spend = panel.total_spend_by_channel();
    let roi = calculate_roi(channels, &decomposition.channel_totals, &spend, None);

    let elasticities: BTreeMap<String, f64> = contributions
        .iter()
        .map(|c| (c.channel.clone(), c.elasticity_mean))
        .collect();
    let response_curves = compute_response_curves(
        channels,
        CurveInputs {
            elasticities: &elasticities,
            current_spend: &spend,
            current_contribution: Some(&decomposition.channel_totals),
            saturation: &media.saturation,
        },
        settings.response_points,
    )?;

    let point = CoefficientPoint::posterior_mean(samples)?;
    let shapley = compute_shapley_values(
        point.intercept.exp(),
        &decomposition.ordered_totals(),
        settings,
        seed,
    )?;
    let shapley_rows = shapley_table(&shapley, &decomposition.channel_totals, channels);

    let diagnostics = convergence_diagnostics(samples, &config.diagnostics)?;
    if !diagnostics.converged {
        warn!("attribution continues on draws that failed convergence checks");
    }

    let predicted_log = predict_log(&design, &point)?;
    let fit = fit_metrics(panel.y(), &predicted_log, design.log_offset())?;
    let residuals = residual_analysis(panel.y(), &predict(&design, &point)?)?;
    let band = posterior_predictive(&design, samples, panel.y(), settings, seed)?;

    let event_coefficients = labelled_summaries(
        samples,
        CoefficientSampleSet::GAMMA_EVENTS,
        panel.events().map(|b| b.names.as_slice()),
    )?;
    let control_coefficients = labelled_summaries(
        samples,
        CoefficientSampleSet::GAMMA_CONTROLS,
        panel.controls().map(|b| b.names.as_slice()),
    )?;

    info!(
        r_squared = fit.r_squared,
        mape = fit.mape,
        converged = diagnostics.converged,
        "attribution complete"
    );
    Ok(AttributionReport {
        provenance: RunProvenance::stamped(input_hash, seed, "mmm-attr", env!("CARGO_PKG_VERSION")),
        contributions,
        decomposition,
        roi,
        response_curves,
        shapley,
        shapley_table: shapley_rows,
        diagnostics,
        fit,
        residuals,
        posterior_predictive: band,
        event_coefficients,
        control_coefficients,
        holdout: None,
        transforms: TransformSummary {
            decay_rates: media.decay_rates.clone(),
            saturation: media.saturation.clone(),
            means: media.means.clone(),
        },
    })
}
