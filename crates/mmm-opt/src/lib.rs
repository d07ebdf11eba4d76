#![deny(missing_docs)]
#![doc = "Optimization engine: constrained budget allocation over channel elasticities, expected lift and scenario comparison."]

pub mod lift;
/// Marginal return helper.
pub mod marginal;
pub mod optimize;
pub mod scenario;

pub use lift::{calculate_expected_lift, ChannelChange, ExpectedLift};
pub use marginal::marginal_roi_loglog;
pub use optimize::{
    optimize_budget_marginal_roi, BudgetAllocation, OptimizationConstraint, OptimizationFailure,
};
pub use scenario::{
    compare_scenarios, create_scenario, BudgetScenario, ComparisonRow, ScenarioBook,
    ScenarioComparison,
};
