use std::collections::BTreeMap;

use mmm_core::config::OptimizerSettings;
use mmm_core::errors::MmmError;
use mmm_opt::{
    calculate_expected_lift, optimize_budget_marginal_roi, OptimizationConstraint,
};
use proptest::prelude::*;

fn channel_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("ch{i}")).collect()
}

fn keyed(names: &[String], values: &[f64]) -> BTreeMap<String, f64> {
    names.iter().cloned().zip(values.iter().copied()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn allocation_conserves_budget_and_bounds(
        elasticities in prop::collection::vec(0.01f64..1.0, 2..7),
        spend_seed in prop::collection::vec(0.0f64..5_000.0, 7),
        budget in 100.0f64..1e6,
    ) {
        let n = elasticities.len();
        let names = channel_names(n);
        let e = keyed(&names, &elasticities);
        let current = keyed(&names, &spend_seed[..n]);
        let settings = OptimizerSettings::default();
        let out = optimize_budget_marginal_roi(
            budget, &names, &e, &current, 1.0, &BTreeMap::new(), &settings,
        ).unwrap();
        let total: f64 = out.allocation.values().sum();
        prop_assert!((total - budget).abs() <= 1e-9 * budget);
        for spend in out.allocation.values() {
            prop_assert!(*spend >= 0.05 * budget * (1.0 - 1e-9));
            prop_assert!(*spend <= 0.80 * budget * (1.0 + 1e-9));
        }
    }

    #[test]
    fn interior_channels_equalize_marginal_ratio(
        elasticities in prop::collection::vec(0.05f64..0.5, 2..6),
        spend_seed in prop::collection::vec(prop_oneof![1 => Just(0.0), 2 => 1.0f64..5_000.0], 6),
        budget in 1_000.0f64..1e5,
    ) {
        let n = elasticities.len();
        let names = channel_names(n);
        let e = keyed(&names, &elasticities);
        let current = keyed(&names, &spend_seed[..n]);
        let open: BTreeMap<String, OptimizationConstraint> = names
            .iter()
            .map(|c| (c.clone(), OptimizationConstraint::new(0.0, 1.0)))
            .collect();
        let out = optimize_budget_marginal_roi(
            budget, &names, &e, &current, 1.0, &open, &OptimizerSettings::default(),
        ).unwrap();
        prop_assert!(out.converged);
        let total_e: f64 = elasticities.iter().sum();
        let lambda = total_e / budget;
        for (name, elasticity) in &e {
            let ratio = elasticity / out.allocation[name];
            prop_assert!((ratio - lambda).abs() <= 1e-6 * lambda);
        }
    }
}

#[test]
fn two_channel_example_end_to_end() {
    let names = channel_names(2);
    let e = keyed(&names, &[0.2, 0.1]);
    let current = keyed(&names, &[500.0, 500.0]);
    let out = optimize_budget_marginal_roi(
        1000.0,
        &names,
        &e,
        &current,
        2000.0,
        &BTreeMap::new(),
        &OptimizerSettings::default(),
    )
    .unwrap();
    assert!((out.allocation["ch0"] - 666.666_666_7).abs() < 1e-4);
    assert!((out.allocation["ch1"] - 333.333_333_3).abs() < 1e-4);

    let lift = calculate_expected_lift(&current, &out.allocation, &e, 10_000.0);
    let expected = 0.2 * (1.0 / 3.0) - 0.1 * (1.0 / 3.0);
    assert!((lift.lift_pct - 100.0 * expected).abs() < 1e-6);
    assert!(lift.lift > 0.0);
}

#[test]
fn higher_elasticity_channel_gains_from_lopsided_start() {
    let names = vec!["A".to_string(), "B".to_string()];
    let e = keyed(&names, &[0.2, 0.1]);
    let current = keyed(&names, &[600.0, 400.0]);
    let out = optimize_budget_marginal_roi(
        1000.0,
        &names,
        &e,
        &current,
        1000.0,
        &BTreeMap::new(),
        &OptimizerSettings::default(),
    )
    .unwrap();
    let (a, b) = (out.allocation["A"], out.allocation["B"]);
    assert!(out.converged);
    assert!(a > 600.0 && a <= 800.0 * (1.0 + 1e-12));
    assert!(b >= 50.0 * (1.0 - 1e-12));
    assert!((0.2 / a - 0.1 / b).abs() <= 1e-9 * (0.2 / a));
    assert!((out.marginal_roi["A"] - out.marginal_roi["B"]).abs() < 1e-6);
}

#[test]
fn zero_spend_channels_reach_interior_optimum() {
    let names = channel_names(30);
    let elasticities: Vec<f64> = (0..30).map(|i| 0.01 + 0.001 * i as f64).collect();
    let e = keyed(&names, &elasticities);
    let mut spend = vec![100.0; 30];
    spend[0] = 0.0;
    spend[1] = 0.0;
    let current = keyed(&names, &spend);
    let open: BTreeMap<String, OptimizationConstraint> = names
        .iter()
        .map(|c| (c.clone(), OptimizationConstraint::new(0.0, 1.0)))
        .collect();
    let budget = 3000.0;
    let out = optimize_budget_marginal_roi(
        budget,
        &names,
        &e,
        &current,
        1.0,
        &open,
        &OptimizerSettings::default(),
    )
    .unwrap();
    assert!(out.converged);
    let lambda = elasticities.iter().sum::<f64>() / budget;
    for (name, elasticity) in &e {
        let ratio = elasticity / out.allocation[name];
        assert!((ratio - lambda).abs() <= 1e-6 * lambda, "{name}: {ratio} vs {lambda}");
    }
}

#[test]
fn iteration_cap_returns_best_iterate() {
    let names = channel_names(2);
    let e = keyed(&names, &[0.1, 0.1]);
    let current = keyed(&names, &[900.0, 100.0]);
    let settings = OptimizerSettings {
        max_iterations: 0,
        ..OptimizerSettings::default()
    };
    let failure = optimize_budget_marginal_roi(
        1000.0,
        &names,
        &e,
        &current,
        1.0,
        &BTreeMap::new(),
        &settings,
    )
    .unwrap_err();
    assert!(matches!(failure.error, MmmError::OptimizerNonConvergence(_)));
    let best = failure.best_iterate.unwrap();
    assert!((best["ch0"] - 800.0).abs() < 1e-9);
    assert!((best["ch1"] - 1000.0 / 9.0).abs() < 1e-9);
}

#[test]
fn same_problem_converges_with_iterations() {
    let names = channel_names(2);
    let e = keyed(&names, &[0.1, 0.1]);
    let current = keyed(&names, &[900.0, 100.0]);
    let out = optimize_budget_marginal_roi(
        1000.0,
        &names,
        &e,
        &current,
        1.0,
        &BTreeMap::new(),
        &OptimizerSettings::default(),
    )
    .unwrap();
    assert!(out.converged);
    assert!((out.allocation["ch0"] - 500.0).abs() < 1e-4);
}

#[test]
fn inverted_bounds_are_infeasible() {
    let names = channel_names(2);
    let bounds: BTreeMap<String, OptimizationConstraint> =
        [("ch0".to_string(), OptimizationConstraint::new(0.5, 0.2))]
            .into_iter()
            .collect();
    let failure = optimize_budget_marginal_roi(
        1000.0,
        &names,
        &keyed(&names, &[0.1, 0.1]),
        &BTreeMap::new(),
        1.0,
        &bounds,
        &OptimizerSettings::default(),
    )
    .unwrap_err();
    assert_eq!(failure.error.info().code, "inverted-bounds");
}
