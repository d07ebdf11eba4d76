#![deny(missing_docs)]
#![doc = "Media transformation engine: geometric adstock, Hill saturation, log scaling and seasonality/trend feature builders."]

pub mod adstock;
/// Seasonality, trend, event and control features.
pub mod features;
/// Log-scale transform and inverse.
pub mod logscale;
pub mod pipeline;
pub mod saturation;

pub use adstock::{check_decay, geometric_adstock, geometric_adstock_matrix, DecayRates};
pub use features::{
    event_indicators, fourier_features, fourier_features_at, standardize_columns, trend_feature,
    trend_feature_at, EventWindow, TrendKind,
};
pub use logscale::{
    inverse_log_series, inverse_log_transform, log_series, log_transform, DEFAULT_LOG_OFFSET,
};
pub use pipeline::{transform_panel, transform_with_means, TransformedMedia};
pub use saturation::{
    hill_derivative, hill_function, hill_function_scaled, hill_series, hill_series_scaled,
};
