use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use mmm_opt::{create_scenario, ScenarioBook};
use serde::Deserialize;
use tracing::info;

use crate::{read_json, write_csv, write_json};

#[derive(Args, Debug)]
pub struct ScenariosArgs {
    /// JSON scenario request.
    #[arg(long)]
    pub input: PathBuf,
    /// Output directory.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ScenarioEntry {
    name: String,
    allocation: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ScenarioRequest {
    elasticities: BTreeMap<String, f64>,
    baseline_outcome: f64,
    #[serde(default)]
    baseline_spend: BTreeMap<String, f64>,
    scenarios: Vec<ScenarioEntry>,
}

pub fn run(args: &ScenariosArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let request: ScenarioRequest = read_json(&args.input)?;

    let mut book = ScenarioBook::new();
    for entry in &request.scenarios {
        book.push(create_scenario(
            &entry.name,
            &entry.allocation,
            &request.elasticities,
            request.baseline_outcome,
            &request.baseline_spend,
        )?)?;
    }
    let comparison = book.compare();
    write_json(args.out.join("scenarios.json"), &book)?;

    let rows: Vec<Vec<String>> = comparison
        .rows
        .iter()
        .map(|row| {
            std::iter::once(row.scenario.clone())
                .chain(row.values.iter().map(f64::to_string))
                .collect()
        })
        .collect();
    write_csv(args.out.join("comparison.csv"), &comparison.columns, &rows)?;
    info!(scenarios = book.len(), "scenarios written");
    Ok(())
}
