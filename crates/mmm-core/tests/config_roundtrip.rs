use std::fs;

use mmm_core::config::{load_config, EngineConfig};
use mmm_core::serde::to_yaml_string;

#[test]
fn empty_yaml_yields_defaults() {
    let config = EngineConfig::from_yaml_str("{}").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.optimizer.default_min_fraction, 0.05);
    assert_eq!(config.optimizer.default_max_fraction, 0.80);
    assert_eq!(config.attribution.shapley_exact_max_channels, 10);
    assert_eq!(config.diagnostics.max_rhat, 1.05);
}

#[test]
fn defaults_survive_yaml_roundtrip() {
    let config = EngineConfig::default();
    let yaml = to_yaml_string(&config).unwrap();
    let back = EngineConfig::from_yaml_str(&yaml).unwrap();
    assert_eq!(back, config);
}

#[test]
fn channel_overrides_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    fs::write(
        &path,
        "transform:\n  channels:\n    tv:\n      decay_rate: 0.6\n      saturation:\n        K: 5000\n        S: 1.5\nseed_policy:\n  master_seed: 7\n",
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    let tv = config.channel_transform("tv");
    assert!(tv.enabled);
    assert_eq!(tv.decay_rate, 0.6);
    assert_eq!(tv.saturation.unwrap().k, 5000.0);
    assert_eq!(config.channel_transform("radio").decay_rate, 0.3);
    assert_eq!(config.seed_policy.master_seed, 7);
}

#[test]
fn invalid_decay_is_rejected() {
    let err = EngineConfig::from_yaml_str("transform:\n  channels:\n    tv:\n      decay_rate: 1.2\n")
        .unwrap_err();
    assert_eq!(err.info().code, "decay-out-of-range");
}
