#![deny(missing_docs)]
#![doc = "Core data model, error taxonomy, configuration and seeding policy shared by the MMM transformation, attribution and optimization engines."]

/// YAML engine configuration and defaults.
pub mod config;
pub mod errors;
/// Stable hashing helpers.
pub mod hash;
pub mod numeric;
pub mod provenance;
pub mod rng;
/// Canonical JSON and YAML helpers.
pub mod serde;
/// Panel, transform config and coefficient sample types.
pub mod types;

pub use config::{
    load_config, AttributionSettings, ConvergenceThresholds, EngineConfig, OptimizerSettings,
    SeedPolicy, TransformSettings,
};
pub use errors::{ErrorInfo, MmmError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{
    ChannelTransformConfig, CoefficientSampleSet, EstimatorDiagnostics, FeatureBlock, Panel,
    ParameterDraws, SaturationParams,
};
