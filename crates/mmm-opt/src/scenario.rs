//! Named allocation snapshots and their side-by-side comparison.

use std::collections::{BTreeMap, BTreeSet};

use mmm_core::errors::{ErrorInfo, MmmError};
use mmm_core::numeric::{finite_or_zero, ratio_or_zero};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Multiplier step per unit elasticity used when a channel has no baseline spend.
pub const COARSE_STEP: f64 = 0.1;

fn scenario_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

/// Immutable snapshot of an allocation and its projected outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetScenario {
    /// Scenario name, unique within a [`ScenarioBook`].
    pub name: String,
    /// Spend per channel.
    pub allocation: BTreeMap<String, f64>,
    /// Total spend.
    pub total_spend: f64,
    /// Projected outcome.
    pub projected_outcome: f64,
    /// `projected_outcome / total_spend`, 0 without spend.
    pub roi: f64,
}

/// Projects the outcome of `allocation` relative to `baseline_outcome`.
///
/// Each channel with positive spend and a known elasticity multiplies the
/// baseline by `(spend / baseline_spend)^e` when its baseline spend is
/// positive, otherwise by the coarse factor `1 + 0.1 e`.
pub fn create_scenario(
    name: &str,
    allocation: &BTreeMap<String, f64>,
    elasticities: &BTreeMap<String, f64>,
    baseline_outcome: f64,
    baseline_spend: &BTreeMap<String, f64>,
) -> Result<BudgetScenario, MmmError> {
    if name.trim().is_empty() {
        return Err(scenario_error("empty-name", "scenario name must not be empty"));
    }
    if let Some((channel, spend)) = allocation
        .iter()
        .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
    {
        return Err(scenario_error("negative-spend", "scenario spend must be finite and >= 0")
            .with_context("scenario", name)
            .with_context("channel", channel)
            .with_context("spend", spend));
    }
    if !baseline_outcome.is_finite() {
        return Err(scenario_error("non-finite-input", "baseline outcome must be finite")
            .with_context("scenario", name));
    }

    let total_spend: f64 = allocation.values().sum();
    let multiplier: f64 = allocation
        .iter()
        .filter(|(_, spend)| **spend > 0.0)
        .filter_map(|(channel, spend)| {
            let elasticity = *elasticities.get(channel)?;
            let factor = match baseline_spend.get(channel) {
                Some(&base) if base > 0.0 => (spend / base).powf(elasticity),
                _ => 1.0 + COARSE_STEP * elasticity,
            };
            Some(factor)
        })
        .product();
    let projected_outcome = finite_or_zero(baseline_outcome * multiplier);
    debug!(scenario = name, total_spend, projected_outcome, "scenario created");
    Ok(BudgetScenario {
        name: name.to_string(),
        allocation: allocation.clone(),
        total_spend,
        projected_outcome,
        roi: ratio_or_zero(projected_outcome, total_spend),
    })
}

/// One comparison row; `values` align with the comparison columns after `scenario`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Scenario name.
    pub scenario: String,
    /// Numeric cells.
    pub values: Vec<f64>,
}

/// Tabular comparison of scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    /// `scenario`, `total_spend`, `projected_outcome`, `roi`, then `spend_<channel>` sorted by channel.
    pub columns: Vec<String>,
    /// One row per scenario in input order.
    pub rows: Vec<ComparisonRow>,
}

/// Builds the comparison table; channels missing from a scenario show 0 spend.
pub fn compare_scenarios(scenarios: &[BudgetScenario]) -> ScenarioComparison {
    let channels: BTreeSet<&String> = scenarios
        .iter()
        .flat_map(|s| s.allocation.keys())
        .collect();
    let mut columns: Vec<String> = ["scenario", "total_spend", "projected_outcome", "roi"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(channels.iter().map(|c| format!("spend_{c}")));
    let rows = scenarios
        .iter()
        .map(|scenario| {
            let mut values = vec![scenario.total_spend, scenario.projected_outcome, scenario.roi];
            values.extend(
                channels
                    .iter()
                    .map(|c| scenario.allocation.get(*c).copied().unwrap_or(0.0)),
            );
            ComparisonRow {
                scenario: scenario.name.clone(),
                values,
            }
        })
        .collect();
    ScenarioComparison { columns, rows }
}

/// Insertion-ordered collection of uniquely named scenarios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBook {
    scenarios: Vec<BudgetScenario>,
}

impl ScenarioBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `scenario`, rejecting a name already present.
    pub fn push(&mut self, scenario: BudgetScenario) -> Result<(), MmmError> {
        if self.get(&scenario.name).is_some() {
            return Err(scenario_error("duplicate-scenario", "scenario name already used")
                .with_context("scenario", &scenario.name));
        }
        self.scenarios.push(scenario);
        Ok(())
    }

    /// Removes and returns the named scenario.
    pub fn remove(&mut self, name: &str) -> Option<BudgetScenario> {
        let idx = self.scenarios.iter().position(|s| s.name == name)?;
        Some(self.scenarios.remove(idx))
    }

    /// Looks up a scenario.
    pub fn get(&self, name: &str) -> Option<&BudgetScenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Scenarios in insertion order.
    pub fn scenarios(&self) -> &[BudgetScenario] {
        &self.scenarios
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Comparison table in insertion order.
    pub fn compare(&self) -> ScenarioComparison {
        compare_scenarios(&self.scenarios)
    }
}
