use mmm_core::serde::{from_json_slice, to_canonical_json_bytes};
use mmm_core::{CoefficientSampleSet, EstimatorDiagnostics, Panel, ParameterDraws};

#[test]
fn panel_roundtrips_and_revalidates() {
    let panel = Panel::new(
        vec!["tv".into(), "search".into()],
        vec![100.0, 120.0],
        vec![vec![10.0, 5.0], vec![0.0, 7.0]],
    )
    .unwrap()
    .with_trend(vec![0.5, 1.0])
    .unwrap();
    let bytes = to_canonical_json_bytes(&panel).unwrap();
    let back: Panel = from_json_slice(&bytes).unwrap();
    assert_eq!(back, panel);
}

#[test]
fn malformed_panel_json_is_rejected() {
    let data = br#"{"channels": ["tv"], "y": [1.0, 2.0], "spend": [[1.0]]}"#;
    let err = from_json_slice::<Panel>(data).unwrap_err();
    assert_eq!(err.info().code, "json-deserialize");
}

#[test]
fn sample_set_roundtrips() {
    let set = CoefficientSampleSet::new()
        .with("beta", ParameterDraws::new(2, 2, 2, vec![0.1, 0.2, 0.1, 0.2, 0.1, 0.2, 0.1, 0.2]).unwrap())
        .unwrap()
        .with("intercept", ParameterDraws::new(2, 2, 1, vec![1.0, 1.1, 0.9, 1.0]).unwrap())
        .unwrap()
        .with_diagnostics(EstimatorDiagnostics { divergences: 3 });
    let bytes = to_canonical_json_bytes(&set).unwrap();
    let back: CoefficientSampleSet = from_json_slice(&bytes).unwrap();
    assert_eq!(back, set);
    assert_eq!(back.diagnostics().divergences, 3);
    assert_eq!(back.shape(), Some((2, 2)));
}
