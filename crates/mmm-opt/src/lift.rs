//! First-order outcome lift of moving from one allocation to another.

use std::collections::BTreeMap;

use mmm_core::numeric::finite_or_zero;
use serde::{Deserialize, Serialize};

/// Spend change of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelChange {
    /// Channel name.
    pub channel: String,
    /// Spend before.
    pub current: f64,
    /// Spend after.
    pub optimal: f64,
    /// Percentage change, 0 when the current spend is 0.
    pub change_pct: f64,
}

/// Projected outcome after a reallocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedLift {
    /// Outcome under the current allocation.
    pub current_outcome: f64,
    /// Outcome projected under the new allocation.
    pub expected_outcome: f64,
    /// `expected_outcome - current_outcome`.
    pub lift: f64,
    /// Lift as a percentage of the current outcome.
    pub lift_pct: f64,
    /// Per-channel spend changes, in elasticity key order.
    pub changes: Vec<ChannelChange>,
}

/// Log-log approximation `Δy/y ≈ Σ e_i Δs_i / s_i` over channels with positive current spend.
///
/// Channels are taken from `elasticities`; a channel missing from either
/// allocation counts as zero spend there. Non-finite outcomes and spends are
/// read as 0 so every reported figure stays finite.
pub fn calculate_expected_lift(
    current: &BTreeMap<String, f64>,
    optimal: &BTreeMap<String, f64>,
    elasticities: &BTreeMap<String, f64>,
    current_outcome: f64,
) -> ExpectedLift {
    let current_outcome = finite_or_zero(current_outcome);
    let mut fraction = 0.0;
    let mut changes = Vec::with_capacity(elasticities.len());
    for (channel, elasticity) in elasticities {
        let before = finite_or_zero(current.get(channel).copied().unwrap_or(0.0));
        let after = finite_or_zero(optimal.get(channel).copied().unwrap_or(0.0));
        let relative = if before > 0.0 {
            (after - before) / before
        } else {
            0.0
        };
        fraction += elasticity * relative;
        changes.push(ChannelChange {
            channel: channel.clone(),
            current: before,
            optimal: after,
            change_pct: finite_or_zero(relative * 100.0),
        });
    }
    let fraction = finite_or_zero(fraction);
    let expected_outcome = finite_or_zero(current_outcome * (1.0 + fraction));
    ExpectedLift {
        current_outcome,
        expected_outcome,
        lift: finite_or_zero(expected_outcome - current_outcome),
        lift_pct: fraction * 100.0,
        changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn lift_is_elasticity_weighted() {
        let lift = calculate_expected_lift(
            &map(&[("a", 500.0), ("b", 500.0)]),
            &map(&[("a", 2000.0 / 3.0), ("b", 1000.0 / 3.0)]),
            &map(&[("a", 0.2), ("b", 0.1)]),
            10_000.0,
        );
        let fraction = 0.2 * (1.0 / 3.0) + 0.1 * (-1.0 / 3.0);
        assert!((lift.lift_pct - fraction * 100.0).abs() < 1e-9);
        assert!((lift.expected_outcome - 10_000.0 * (1.0 + fraction)).abs() < 1e-6);
        assert!(lift.lift > 0.0);
    }

    #[test]
    fn zero_current_spend_has_zero_change() {
        let lift = calculate_expected_lift(
            &map(&[("a", 0.0)]),
            &map(&[("a", 250.0)]),
            &map(&[("a", 0.4)]),
            100.0,
        );
        assert_eq!(lift.changes[0].change_pct, 0.0);
        assert_eq!(lift.lift, 0.0);
        assert_eq!(lift.expected_outcome, 100.0);
    }

    #[test]
    fn non_finite_outcome_reads_as_zero() {
        let current = map(&[("a", 100.0)]);
        let optimal = map(&[("a", 150.0)]);
        let e = map(&[("a", 0.2)]);
        for outcome in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let lift = calculate_expected_lift(&current, &optimal, &e, outcome);
            assert_eq!(lift.current_outcome, 0.0);
            assert_eq!(lift.expected_outcome, 0.0);
            assert_eq!(lift.lift, 0.0);
            assert!((lift.lift_pct - 10.0).abs() < 1e-9);
        }
        let nan_spend = calculate_expected_lift(&map(&[("a", f64::NAN)]), &optimal, &e, 10.0);
        assert_eq!(nan_spend.changes[0].current, 0.0);
        assert!(serde_json::to_string(&nan_spend).is_ok());
    }
}
