use std::error::Error;
use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use commands::{
    attribute::{self, AttributeArgs},
    optimize::{self, OptimizeArgs},
    scenarios::{self, ScenariosArgs},
};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "mmm", about = "Marketing-mix attribution and budget optimization")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform a panel and attribute outcome to channels from estimator draws.
    Attribute(AttributeArgs),
    /// Allocate a budget across channels from their elasticities.
    Optimize(OptimizeArgs),
    /// Project and compare named budget scenarios.
    Scenarios(ScenariosArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Attribute(args) => attribute::run(&args),
        Command::Optimize(args) => optimize::run(&args),
        Command::Scenarios(args) => scenarios::run(&args),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let bytes = fs::read(path)?;
    Ok(mmm_core::serde::from_json_slice(&bytes)?)
}

fn write_json<P: AsRef<Path>, T: serde::Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn write_csv<P: AsRef<Path>>(
    path: P,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<(), Box<dyn Error>> {
    let mut file = csv::Writer::from_path(path)?;
    file.write_record(header)?;
    for row in rows {
        file.write_record(row)?;
    }
    file.flush()?;
    Ok(())
}
