use mmm_attr::{attribute, decompose, ModelDesign};
use mmm_core::config::EngineConfig;
use mmm_core::rng::RngHandle;
use mmm_core::types::{
    CoefficientSampleSet, EstimatorDiagnostics, FeatureBlock, Panel, ParameterDraws,
};
use mmm_transform::{event_indicators, transform_panel, trend_feature, EventWindow, TrendKind};
use rand::Rng;

const PERIODS: usize = 24;

fn panel() -> Panel {
    let spend = (0..PERIODS)
        .map(|t| {
            vec![
                200.0 + 50.0 * (t % 4) as f64,
                80.0 + 10.0 * (t % 3) as f64,
                if t % 6 == 0 { 0.0 } else { 30.0 },
            ]
        })
        .collect();
    let y = (0..PERIODS).map(|t| 1_000.0 + 15.0 * t as f64).collect();
    let events = event_indicators(
        PERIODS,
        &[EventWindow {
            name: "launch".into(),
            start: 4,
            end: 6,
        }],
    )
    .unwrap();
    Panel::new(
        vec!["tv".into(), "radio".into(), "search".into()],
        y,
        spend,
    )
    .unwrap()
    .with_trend(trend_feature(PERIODS, TrendKind::Linear))
    .unwrap()
    .with_events(events)
    .unwrap()
    .with_controls(
        FeatureBlock::from_columns(
            vec!["price".into()],
            &[(0..PERIODS).map(|t| (t as f64 - 11.5) / 7.0).collect()],
        )
        .unwrap(),
    )
    .unwrap()
}

fn noisy(rng: &mut RngHandle, centre: f64, spread: f64, runs: usize, draws: usize) -> Vec<Vec<f64>> {
    (0..runs)
        .map(|_| {
            (0..draws)
                .map(|_| centre + spread * (rng.gen::<f64>() - 0.5))
                .collect()
        })
        .collect()
}

fn samples(runs: usize, draws: usize) -> CoefficientSampleSet {
    let mut rng = RngHandle::from_seed(2024);
    let betas: Vec<Vec<Vec<f64>>> = (0..runs)
        .map(|_| {
            (0..draws)
                .map(|_| {
                    vec![
                        0.15 + 0.02 * (rng.gen::<f64>() - 0.5),
                        0.08 + 0.02 * (rng.gen::<f64>() - 0.5),
                        0.04 + 0.02 * (rng.gen::<f64>() - 0.5),
                    ]
                })
                .collect()
        })
        .collect();
    let intercept = noisy(&mut rng, 6.2, 0.1, runs, draws);
    let trend = noisy(&mut rng, 0.2, 0.05, runs, draws);
    let events = noisy(&mut rng, 0.05, 0.02, runs, draws);
    let controls = noisy(&mut rng, -0.01, 0.01, runs, draws);
    CoefficientSampleSet::new()
        .with("intercept", ParameterDraws::scalar(intercept).unwrap())
        .unwrap()
        .with("beta", ParameterDraws::from_nested(betas).unwrap())
        .unwrap()
        .with("gamma_trend", ParameterDraws::scalar(trend).unwrap())
        .unwrap()
        .with("gamma_events", ParameterDraws::scalar(events).unwrap())
        .unwrap()
        .with("gamma_controls", ParameterDraws::scalar(controls).unwrap())
        .unwrap()
        .with_diagnostics(EstimatorDiagnostics { divergences: 0 })
}

#[test]
fn report_covers_every_channel() {
    let panel = panel();
    let config = EngineConfig::default();
    let media = transform_panel(&panel, &config.transform).unwrap();
    let samples = samples(4, 200);
    let report = attribute(&panel, &media, &samples, &config).unwrap();

    assert_eq!(report.contributions.len(), 3);
    assert_eq!(report.roi.len(), 3);
    assert_eq!(report.response_curves.len(), 3);
    assert_eq!(report.shapley_table.len(), 3);
    assert_eq!(report.decomposition.rows.len(), PERIODS);
    assert_eq!(report.posterior_predictive.lower.len(), PERIODS);
    assert_eq!(report.posterior_predictive.draws_used, 500);
    assert_eq!(report.provenance.seed, 42);
    assert_eq!(report.provenance.input_hash.len(), 64);
    assert!(report.diagnostics.converged);
    assert_eq!(report.event_coefficients.as_ref().unwrap()[0].name, "launch");
    assert_eq!(report.control_coefficients.as_ref().unwrap()[0].name, "price");

    for row in &report.decomposition.rows {
        assert!(row.baseline >= 0.0);
        assert!(row.channels.values().all(|v| *v >= 0.0));
    }
    let shapley_total = report.shapley.total();
    let direct_total: f64 = report.decomposition.channel_totals.values().sum();
    assert!((shapley_total - direct_total).abs() < 1e-6 * direct_total.max(1.0));
    let share_total: f64 = report.shapley_table.iter().map(|r| r.share_pct).sum();
    assert!((share_total - 100.0).abs() < 1e-6);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["shapley"]["method"]["kind"], "exact");
    assert_eq!(json["roi"].as_array().unwrap().len(), 3);
}

#[test]
fn report_hash_tracks_inputs() {
    let panel = panel();
    let config = EngineConfig::default();
    let media = transform_panel(&panel, &config.transform).unwrap();
    let samples = samples(2, 50);
    let a = attribute(&panel, &media, &samples, &config).unwrap();
    let b = attribute(&panel, &media, &samples, &config).unwrap();
    assert_eq!(a.provenance.input_hash, b.provenance.input_hash);
    assert_eq!(a.shapley, b.shapley);
    assert_eq!(a.posterior_predictive, b.posterior_predictive);

    let mut reseeded = config.clone();
    reseeded.seed_policy.master_seed = 7;
    let c = attribute(&panel, &media, &samples, &reseeded).unwrap();
    assert_ne!(a.provenance.input_hash, c.provenance.input_hash);
}

#[test]
fn disjoint_runs_fail_convergence_without_blocking() {
    let panel = panel();
    let config = EngineConfig::default();
    let media = transform_panel(&panel, &config.transform).unwrap();
    let mut samples = samples(2, 100);
    let intercept = ParameterDraws::scalar(vec![vec![5.0; 100], vec![7.0; 100]]).unwrap();
    samples.insert("intercept", intercept).unwrap();
    let report = attribute(&panel, &media, &samples, &config).unwrap();
    assert!(!report.diagnostics.converged);
    assert_eq!(report.diagnostics.undefined_rhat, 1);
}

#[test]
fn decomposition_totals_are_non_negative() {
    let panel = panel();
    let config = EngineConfig::default();
    let media = transform_panel(&panel, &config.transform).unwrap();
    let design = ModelDesign::from_panel(&panel, &media).unwrap();
    let table = decompose(&design, &samples(2, 20), panel.y()).unwrap();
    assert!(table.channel_totals.values().all(|v| *v >= 0.0));
    assert_eq!(table.channel_order, panel.channels());
}
