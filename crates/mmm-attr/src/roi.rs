use std::collections::BTreeMap;

use mmm_core::numeric::ratio_or_zero;
use serde::{Deserialize, Serialize};

/// Return on spend for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiRecord {
    /// Channel name.
    pub channel: String,
    /// Total spend.
    pub spend: f64,
    /// Attributed contribution.
    pub contribution: f64,
    /// `contribution / spend`, 0 when spend is not positive.
    pub roi: f64,
    /// Lower ROI bound when a contribution interval was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_ci_lower: Option<f64>,
    /// Upper ROI bound when a contribution interval was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_ci_upper: Option<f64>,
}

/// One record per channel in `channels` order; missing spend reads as 0.
pub fn calculate_roi(
    channels: &[String],
    contributions: &BTreeMap<String, f64>,
    spend: &BTreeMap<String, f64>,
    intervals: Option<&BTreeMap<String, (f64, f64)>>,
) -> Vec<RoiRecord> {
    channels
        .iter()
        .map(|channel| {
            let contribution = contributions.get(channel).copied().unwrap_or(0.0);
            let channel_spend = spend.get(channel).copied().unwrap_or(0.0);
            let interval = intervals.and_then(|map| map.get(channel));
            RoiRecord {
                channel: channel.clone(),
                spend: channel_spend,
                contribution,
                roi: ratio_or_zero(contribution, channel_spend),
                roi_ci_lower: interval.map(|(lo, _)| ratio_or_zero(*lo, channel_spend)),
                roi_ci_upper: interval.map(|(_, hi)| ratio_or_zero(*hi, channel_spend)),
            }
        })
        .collect()
}
