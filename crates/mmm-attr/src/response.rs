//! Spend response curves and marginal ROI per channel.

use std::collections::BTreeMap;

use mmm_core::errors::MmmError;
use mmm_core::numeric::{argmin_abs, finite_or_zero, linspace};
use mmm_core::types::SaturationParams;
use mmm_transform::hill_function;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Elasticity assumed for a channel without an estimate.
pub const DEFAULT_ELASTICITY: f64 = 0.1;
/// Spend assumed for a channel without an observed spend.
pub const DEFAULT_CURRENT_SPEND: f64 = 1.0;
/// Contribution multiple of spend assumed for a channel without a contribution.
pub const DEFAULT_CONTRIBUTION_MULTIPLE: f64 = 2.0;
/// Smallest upper end of a curve's spend grid.
pub const MIN_CURVE_SPEND: f64 = 1000.0;

/// One grid point of a response curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponsePoint {
    /// Spend level.
    pub spend: f64,
    /// Expected contribution at this spend.
    pub response: f64,
    /// Return on the next unit of spend.
    pub marginal_roi: f64,
    /// Grid point nearest to the current spend.
    pub is_current: bool,
}

/// Response curve of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    /// Channel name.
    pub channel: String,
    /// Grid points in increasing spend order.
    pub points: Vec<ResponsePoint>,
    /// Index of the point flagged `is_current`.
    pub current_index: usize,
}

/// Inputs shared by every channel's curve.
#[derive(Debug, Clone, Copy)]
pub struct CurveInputs<'a> {
    /// Posterior mean elasticities.
    pub elasticities: &'a BTreeMap<String, f64>,
    /// Current spend per channel.
    pub current_spend: &'a BTreeMap<String, f64>,
    /// Current dollar contribution per channel.
    pub current_contribution: Option<&'a BTreeMap<String, f64>>,
    /// Saturation parameters per channel, K in raw spend units.
    pub saturation: &'a BTreeMap<String, Option<SaturationParams>>,
}

/// Builds a curve per channel over `linspace(0.01·max, max, points)` with
/// `max = max(3·current, 1000)`.
pub fn compute_response_curves(
    channels: &[String],
    inputs: CurveInputs<'_>,
    points: usize,
) -> Result<BTreeMap<String, ResponseCurve>, MmmError> {
    if points < 2 {
        return Err(MmmError::invalid("response-points", "response curves need at least two points")
            .with_context("points", points));
    }
    channels
        .iter()
        .map(|channel| {
            let elasticity = inputs
                .elasticities
                .get(channel)
                .copied()
                .unwrap_or(DEFAULT_ELASTICITY);
            let current = inputs
                .current_spend
                .get(channel)
                .copied()
                .unwrap_or(DEFAULT_CURRENT_SPEND);
            let contribution = inputs
                .current_contribution
                .and_then(|map| map.get(channel).copied())
                .unwrap_or(current * DEFAULT_CONTRIBUTION_MULTIPLE);
            let saturation = inputs
                .saturation
                .get(channel)
                .copied()
                .flatten()
                .filter(|params| params.k > 0.0);
            let curve = channel_curve(channel, elasticity, current, contribution, saturation, points)?;
            Ok((channel.clone(), curve))
        })
        .collect()
}

fn channel_curve(
    channel: &str,
    elasticity: f64,
    current: f64,
    contribution: f64,
    saturation: Option<SaturationParams>,
    points: usize,
) -> Result<ResponseCurve, MmmError> {
    let max_spend = (3.0 * current).max(MIN_CURVE_SPEND);
    let grid = linspace(0.01 * max_spend, max_spend, points);
    let current_index = argmin_abs(&grid, current).unwrap_or(0);
    debug!(channel, elasticity, current, saturated = saturation.is_some(), "building response curve");

    let mut out = Vec::with_capacity(points);
    for (idx, &spend) in grid.iter().enumerate() {
        let (response, marginal_roi) = match saturation {
            Some(params) => {
                let at_current = hill_function(current.max(0.0), params.k, params.s)?;
                let at_spend = hill_function(spend, params.k, params.s)?;
                if at_current > 0.0 {
                    let scale = contribution / at_current;
                    let eps = (spend * 0.001).max(0.1);
                    let slope =
                        (hill_function(spend + eps, params.k, params.s)? - at_spend) / eps;
                    (scale * at_spend, slope * scale)
                } else {
                    (0.0, 0.0)
                }
            }
            None => {
                if current > 0.0 {
                    let amplitude = contribution / current.powf(elasticity);
                    let response = amplitude * spend.powf(elasticity);
                    (response, elasticity * response / spend)
                } else {
                    (0.0, 0.0)
                }
            }
        };
        out.push(ResponsePoint {
            spend,
            response: finite_or_zero(response),
            marginal_roi: finite_or_zero(marginal_roi),
            is_current: idx == current_index,
        });
    }
    Ok(ResponseCurve {
        channel: channel.to_string(),
        points: out,
        current_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maps() -> (
        BTreeMap<String, f64>,
        BTreeMap<String, f64>,
        BTreeMap<String, f64>,
        BTreeMap<String, Option<SaturationParams>>,
    ) {
        let elasticities = [("tv".to_string(), 0.5)].into_iter().collect();
        let spend = [("tv".to_string(), 1000.0), ("radio".to_string(), 0.0)]
            .into_iter()
            .collect();
        let contribution = [("tv".to_string(), 4000.0)].into_iter().collect();
        let saturation = [(
            "hill".to_string(),
            Some(SaturationParams { k: 500.0, s: 2.0 }),
        )]
        .into_iter()
        .collect();
        (elasticities, spend, contribution, saturation)
    }

    #[test]
    fn power_curve_passes_through_current_point() {
        let (e, s, c, sat) = maps();
        let inputs = CurveInputs {
            elasticities: &e,
            current_spend: &s,
            current_contribution: Some(&c),
            saturation: &sat,
        };
        let curves = compute_response_curves(&["tv".to_string()], inputs, 31).unwrap();
        let curve = &curves["tv"];
        assert_eq!(curve.points.len(), 31);
        assert!((curve.points[0].spend - 30.0).abs() < 1e-9);
        assert!((curve.points[30].spend - 3000.0).abs() < 1e-9);
        let current = curve.points[curve.current_index];
        assert!(current.is_current);
        assert_eq!(curve.current_index, 10);
        let expected = 4000.0 * (current.spend / 1000.0).sqrt();
        assert!((current.response - expected).abs() < 1e-6);
        assert!((current.marginal_roi - 0.5 * expected / current.spend).abs() < 1e-9);
        assert_eq!(curve.points.iter().filter(|p| p.is_current).count(), 1);
    }

    #[test]
    fn zero_spend_channel_is_flat() {
        let (e, s, c, sat) = maps();
        let inputs = CurveInputs {
            elasticities: &e,
            current_spend: &s,
            current_contribution: Some(&c),
            saturation: &sat,
        };
        let curves = compute_response_curves(&["radio".to_string()], inputs, 10).unwrap();
        assert!(curves["radio"]
            .points
            .iter()
            .all(|p| p.response == 0.0 && p.marginal_roi == 0.0));
        assert_eq!(curves["radio"].current_index, 0);
    }

    #[test]
    fn saturated_curve_flattens() {
        let (e, _, _, sat) = maps();
        let spend: BTreeMap<String, f64> = [("hill".to_string(), 500.0)].into_iter().collect();
        let inputs = CurveInputs {
            elasticities: &e,
            current_spend: &spend,
            current_contribution: None,
            saturation: &sat,
        };
        let curve = &compute_response_curves(&["hill".to_string()], inputs, 50).unwrap()["hill"];
        let first = curve.points[5].marginal_roi;
        let last = curve.points[49].marginal_roi;
        assert!(last < first);
        let responses: Vec<f64> = curve.points.iter().map(|p| p.response).collect();
        assert!(responses.windows(2).all(|w| w[0] <= w[1]));
        assert!(responses[49] < 1000.0 * 2.0);
    }

    #[test]
    fn too_few_points_is_invalid() {
        let (e, s, c, sat) = maps();
        let inputs = CurveInputs {
            elasticities: &e,
            current_spend: &s,
            current_contribution: Some(&c),
            saturation: &sat,
        };
        assert!(compute_response_curves(&["tv".to_string()], inputs, 1).is_err());
    }
}
