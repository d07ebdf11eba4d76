use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use mmm_attr::{attribute, evaluate_holdout, AttributionReport, ModelDesign};
use mmm_core::config::{load_config, EngineConfig};
use mmm_core::types::{CoefficientSampleSet, Panel};
use mmm_transform::{transform_panel, transform_with_means, TransformedMedia};
use tracing::info;

use crate::{read_json, write_csv, write_json};

#[derive(Args, Debug)]
pub struct AttributeArgs {
    /// YAML engine configuration; defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Training panel in JSON.
    #[arg(long)]
    pub panel: PathBuf,
    /// Coefficient draws in JSON, channel order matching the panel.
    #[arg(long)]
    pub samples: PathBuf,
    /// Held-out panel scored with the training transform means.
    #[arg(long)]
    pub holdout: Option<PathBuf>,
    /// Output directory.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &AttributeArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    let panel: Panel = read_json(&args.panel)?;
    let samples: CoefficientSampleSet = read_json(&args.samples)?;

    let media = transform_panel(&panel, &config.transform)?;
    let mut report = attribute(&panel, &media, &samples, &config)?;
    if let Some(path) = &args.holdout {
        let holdout: Panel = read_json(path)?;
        let metrics = score_holdout(&holdout, &media, &samples, &config)?;
        info!(mape = metrics.mape, periods = metrics.n_periods, "holdout scored");
        report.holdout = Some(metrics);
    }

    write_json(args.out.join("attribution.json"), &report)?;
    write_decomposition(&args.out, &report)?;
    write_roi(&args.out, &report)?;
    write_shapley(&args.out, &report)?;
    info!(out = %args.out.display(), "attribution written");
    Ok(())
}

fn score_holdout(
    holdout: &Panel,
    training: &TransformedMedia,
    samples: &CoefficientSampleSet,
    config: &EngineConfig,
) -> Result<mmm_attr::HoldoutMetrics, Box<dyn Error>> {
    let columns: Vec<Vec<f64>> = (0..holdout.n_channels())
        .map(|idx| holdout.channel_column(idx))
        .collect();
    let media = transform_with_means(holdout.channels(), &columns, &config.transform, training)?;
    let design = ModelDesign::from_panel(holdout, &media)?;
    Ok(evaluate_holdout(&design, samples, holdout.y())?)
}

fn write_decomposition(out: &Path, report: &AttributionReport) -> Result<(), Box<dyn Error>> {
    let table = &report.decomposition;
    let mut header: Vec<String> = ["period", "actual", "predicted", "baseline"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    header.extend(table.channel_order.iter().cloned());
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.period.to_string(),
                row.actual.to_string(),
                row.predicted.to_string(),
                row.baseline.to_string(),
            ];
            cells.extend(
                table
                    .channel_order
                    .iter()
                    .map(|c| row.channels.get(c).copied().unwrap_or(0.0).to_string()),
            );
            cells
        })
        .collect();
    write_csv(out.join("decomposition.csv"), &header, &rows)
}

fn write_roi(out: &Path, report: &AttributionReport) -> Result<(), Box<dyn Error>> {
    let header: Vec<String> = ["channel", "spend", "contribution", "roi"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows: Vec<Vec<String>> = report
        .roi
        .iter()
        .map(|r| {
            vec![
                r.channel.clone(),
                r.spend.to_string(),
                r.contribution.to_string(),
                r.roi.to_string(),
            ]
        })
        .collect();
    write_csv(out.join("roi.csv"), &header, &rows)
}

fn write_shapley(out: &Path, report: &AttributionReport) -> Result<(), Box<dyn Error>> {
    let header: Vec<String> = ["channel", "shapley_value", "share_pct", "direct_contribution"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows: Vec<Vec<String>> = report
        .shapley_table
        .iter()
        .map(|r| {
            vec![
                r.channel.clone(),
                r.shapley_value.to_string(),
                r.share_pct.to_string(),
                r.direct_contribution.to_string(),
            ]
        })
        .collect();
    write_csv(out.join("shapley.csv"), &header, &rows)
}
