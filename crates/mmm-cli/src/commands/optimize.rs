use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use mmm_core::config::{load_config, EngineConfig};
use mmm_opt::{
    calculate_expected_lift, optimize_budget_marginal_roi, BudgetAllocation, ExpectedLift,
    OptimizationConstraint,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::{read_json, write_json};

#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// YAML engine configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// JSON map of channel to elasticity.
    #[arg(long)]
    pub elasticities: PathBuf,
    /// JSON map of channel to current spend.
    #[arg(long)]
    pub current: PathBuf,
    /// JSON map of channel to `{min_fraction, max_fraction}`.
    #[arg(long)]
    pub constraints: Option<PathBuf>,
    /// Total budget to allocate.
    #[arg(long)]
    pub budget: f64,
    /// Average outcome per period, used for marginal ROI and lift.
    #[arg(long, default_value_t = 1.0)]
    pub avg_outcome: f64,
    /// Output directory.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
struct OptimizationOutput {
    total_budget: f64,
    result: BudgetAllocation,
    lift: ExpectedLift,
}

pub fn run(args: &OptimizeArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let elasticities: BTreeMap<String, f64> = read_json(&args.elasticities)?;
    let current: BTreeMap<String, f64> = read_json(&args.current)?;
    let constraints: BTreeMap<String, OptimizationConstraint> = match &args.constraints {
        Some(path) => read_json(path)?,
        None => BTreeMap::new(),
    };
    let channels: Vec<String> = elasticities.keys().cloned().collect();

    match optimize_budget_marginal_roi(
        args.budget,
        &channels,
        &elasticities,
        &current,
        args.avg_outcome,
        &constraints,
        &config.optimizer,
    ) {
        Ok(result) => {
            let lift =
                calculate_expected_lift(&current, &result.allocation, &elasticities, args.avg_outcome);
            info!(lift_pct = lift.lift_pct, iterations = result.iterations, "allocation found");
            write_json(
                args.out.join("optimization.json"),
                &OptimizationOutput {
                    total_budget: args.budget,
                    result,
                    lift,
                },
            )?;
            Ok(())
        }
        Err(failure) => {
            error!(%failure, "optimization failed");
            write_json(
                args.out.join("optimization.json"),
                &json!({
                    "total_budget": args.budget,
                    "error": failure.error,
                    "best_iterate": failure.best_iterate,
                }),
            )?;
            Err(Box::new(failure))
        }
    }
}
