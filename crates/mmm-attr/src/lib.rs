#![deny(missing_docs)]
#![doc = "Attribution engine: elasticity summaries, outcome decomposition, Shapley allocation, response curves, ROI and estimator diagnostics."]

/// Per-channel elasticity and contribution summaries.
pub mod contributions;
pub mod decompose;
pub mod design;
pub mod diagnostics;
pub mod fit;
pub mod predictive;
pub mod report;
pub mod response;
/// Return on spend.
pub mod roi;
pub mod shapley;

pub use contributions::{compute_channel_contributions, ChannelContribution};
pub use decompose::{decompose, DecompositionRow, DecompositionTable};
pub use design::{CoefficientPoint, ModelDesign};
pub use diagnostics::{
    convergence_diagnostics, effective_sample_size, split_rhat, ConvergenceReport,
    ParameterDiagnostic,
};
pub use fit::{
    fit_metrics, holdout_metrics, residual_analysis, FitMetrics, Histogram, HoldoutMetrics,
    ResidualAnalysis,
};
pub use predictive::{
    coefficient_summaries, evaluate_holdout, posterior_predictive, predict, predict_log,
    CoefficientSummary, PredictiveBand,
};
pub use report::{attribute, AttributionReport, TransformSummary};
pub use response::{compute_response_curves, CurveInputs, ResponseCurve, ResponsePoint};
pub use roi::{calculate_roi, RoiRecord};
pub use shapley::{
    compute_shapley_values, exact_shapley, sampled_shapley, shapley_table, ShapleyAllocation,
    ShapleyMethod, ShapleyRow,
};
