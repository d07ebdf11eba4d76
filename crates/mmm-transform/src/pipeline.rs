//! Per-channel transform chain: adstock, mean scaling, saturation, log.

use std::collections::BTreeMap;

use mmm_core::config::TransformSettings;
use mmm_core::errors::{ErrorInfo, MmmError};
use mmm_core::numeric::mean;
use mmm_core::types::{Panel, SaturationParams};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adstock::geometric_adstock;
use crate::logscale::log_series;
use crate::saturation::hill_series_scaled;

/// Transformed media, stored column-major (one vector per channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedMedia {
    /// Channel names in column order.
    pub channels: Vec<String>,
    /// Adstocked (and mean-scaled, when enabled) columns.
    pub adstocked: Vec<Vec<f64>>,
    /// Columns after optional saturation; equal to `adstocked` for unsaturated channels.
    pub saturated: Vec<Vec<f64>>,
    /// `ln(saturated + offset)` columns fed to the estimator.
    pub log_media: Vec<Vec<f64>>,
    /// Scaling means per channel (1.0 when scaling is disabled or the mean is zero).
    pub means: BTreeMap<String, f64>,
    /// Decay rate applied per channel (0.0 when adstock is disabled).
    pub decay_rates: BTreeMap<String, f64>,
    /// Saturation parameters per channel, K in raw spend units.
    pub saturation: BTreeMap<String, Option<SaturationParams>>,
    /// Offset used by the log transform.
    pub log_offset: f64,
}

impl TransformedMedia {
    /// Number of periods.
    pub fn n_periods(&self) -> usize {
        self.log_media.first().map(Vec::len).unwrap_or(0)
    }

    /// Log-media values of every channel for one period.
    pub fn log_row(&self, period: usize) -> Vec<f64> {
        self.log_media.iter().map(|col| col[period]).collect()
    }

    /// Column means of the log-media matrix.
    pub fn log_means(&self) -> Vec<f64> {
        self.log_media.iter().map(|col| mean(col)).collect()
    }
}

struct ColumnOutput {
    adstocked: Vec<f64>,
    saturated: Vec<f64>,
    log_media: Vec<f64>,
    mean: f64,
    decay: f64,
}

fn transform_column(
    channel: &str,
    column: &[f64],
    settings: &TransformSettings,
    fixed_mean: Option<f64>,
) -> Result<ColumnOutput, MmmError> {
    let config = settings.channels.get(channel).copied().unwrap_or_default();
    config.validate(channel)?;
    let decay = config.effective_decay();
    let mut adstocked = geometric_adstock(column, decay, settings.normalize_adstock)
        .map_err(|err| err.with_context("channel", channel))?;

    let mut scale = 1.0;
    if settings.scale_by_mean {
        let column_mean = fixed_mean.unwrap_or_else(|| mean(&adstocked));
        if column_mean > 0.0 {
            scale = column_mean;
            for value in adstocked.iter_mut() {
                *value /= column_mean;
            }
        }
    }

    let saturated = match config.saturation {
        Some(params) => {
            let k_scaled = params.k / scale;
            let max_effect = adstocked.iter().copied().fold(0.0_f64, f64::max);
            debug!(channel, k_raw = params.k, k_scaled, s = params.s, max_effect, "saturating channel");
            hill_series_scaled(&adstocked, k_scaled, params.s, max_effect)
                .map_err(|err| err.with_context("channel", channel))?
        }
        None => adstocked.clone(),
    };

    let log_media = log_series(&saturated, settings.log_offset)
        .map_err(|err| err.with_context("channel", channel))?;

    Ok(ColumnOutput {
        adstocked,
        saturated,
        log_media,
        mean: scale,
        decay,
    })
}

fn assemble(
    channels: &[String],
    outputs: Vec<ColumnOutput>,
    settings: &TransformSettings,
) -> TransformedMedia {
    let mut media = TransformedMedia {
        channels: channels.to_vec(),
        adstocked: Vec::with_capacity(channels.len()),
        saturated: Vec::with_capacity(channels.len()),
        log_media: Vec::with_capacity(channels.len()),
        means: BTreeMap::new(),
        decay_rates: BTreeMap::new(),
        saturation: BTreeMap::new(),
        log_offset: settings.log_offset,
    };
    for (channel, output) in channels.iter().zip(outputs) {
        media.adstocked.push(output.adstocked);
        media.saturated.push(output.saturated);
        media.log_media.push(output.log_media);
        media.means.insert(channel.clone(), output.mean);
        media.decay_rates.insert(channel.clone(), output.decay);
        media.saturation.insert(
            channel.clone(),
            settings.channels.get(channel).and_then(|c| c.saturation),
        );
    }
    media
}

/// Runs the transform chain for every channel of `panel` (channels in parallel).
pub fn transform_panel(
    panel: &Panel,
    settings: &TransformSettings,
) -> Result<TransformedMedia, MmmError> {
    let channels = panel.channels();
    let outputs = channels
        .par_iter()
        .enumerate()
        .map(|(idx, channel)| transform_column(channel, &panel.channel_column(idx), settings, None))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(channels = channels.len(), periods = panel.n_periods(), "transformed panel media");
    Ok(assemble(channels, outputs, settings))
}

/// Transforms held-out spend columns reusing the scaling means of a training run.
pub fn transform_with_means(
    channels: &[String],
    columns: &[Vec<f64>],
    settings: &TransformSettings,
    training: &TransformedMedia,
) -> Result<TransformedMedia, MmmError> {
    if channels.len() != columns.len() {
        return Err(MmmError::InvalidInput(
            ErrorInfo::new("channel-width-mismatch", "channel names and columns differ in length")
                .with_context("channels", channels.len())
                .with_context("columns", columns.len()),
        ));
    }
    let outputs = channels
        .par_iter()
        .zip(columns.par_iter())
        .map(|(channel, column)| {
            let fixed = training.means.get(channel).copied().ok_or_else(|| {
                MmmError::invalid("unknown-channel", "channel missing from the training run")
                    .with_context("channel", channel)
            })?;
            transform_column(channel, column, settings, Some(fixed))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assemble(channels, outputs, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmm_core::types::ChannelTransformConfig;

    fn panel() -> Panel {
        Panel::new(
            vec!["tv".into(), "search".into()],
            vec![10.0, 11.0, 12.0, 13.0],
            vec![
                vec![100.0, 0.0],
                vec![0.0, 10.0],
                vec![50.0, 10.0],
                vec![50.0, 20.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn scaled_columns_have_unit_mean() {
        let media = transform_panel(&panel(), &TransformSettings::default()).unwrap();
        for column in &media.adstocked {
            assert!((mean(column) - 1.0).abs() < 1e-12);
        }
        assert_eq!(media.decay_rates["tv"], 0.3);
        assert_eq!(media.saturated, media.adstocked);
    }

    #[test]
    fn disabled_adstock_and_scaling_keeps_raw_log() {
        let mut settings = TransformSettings {
            scale_by_mean: false,
            ..TransformSettings::default()
        };
        for channel in ["tv", "search"] {
            settings.channels.insert(
                channel.to_string(),
                ChannelTransformConfig {
                    enabled: false,
                    ..ChannelTransformConfig::default()
                },
            );
        }
        let media = transform_panel(&panel(), &settings).unwrap();
        assert_eq!(media.log_media[0][0], 101.0_f64.ln());
        assert_eq!(media.log_media[1][0], 0.0);
        assert_eq!(media.decay_rates["search"], 0.0);
        assert_eq!(media.log_row(1), vec![0.0, 11.0_f64.ln()]);
    }

    #[test]
    fn saturation_stays_below_column_max() {
        let mut settings = TransformSettings::default();
        settings.channels.insert(
            "tv".to_string(),
            ChannelTransformConfig {
                saturation: Some(SaturationParams { k: 40.0, s: 2.0 }),
                ..ChannelTransformConfig::default()
            },
        );
        let media = transform_panel(&panel(), &settings).unwrap();
        let max = media.adstocked[0].iter().copied().fold(0.0, f64::max);
        assert!(media.saturated[0].iter().all(|v| *v >= 0.0 && *v < max));
        assert!(media.saturation["tv"].is_some());
        assert!(media.saturation["search"].is_none());
    }

    #[test]
    fn holdout_reuses_training_means() {
        let settings = TransformSettings::default();
        let training = transform_panel(&panel(), &settings).unwrap();
        let holdout = transform_with_means(
            &training.channels,
            &[vec![10.0, 10.0], vec![5.0, 5.0]],
            &settings,
            &training,
        )
        .unwrap();
        assert_eq!(holdout.means, training.means);
        assert_eq!(holdout.n_periods(), 2);
    }
}
