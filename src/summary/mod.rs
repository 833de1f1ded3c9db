//! Time summaries of observation streams.
//!
//! [`TimeSummary`] groups observations into regularly stepped time windows
//! and replaces each group with one row per requested statistic. The
//! writer consumes it through the [`SummaryAdapter`] trait.

pub mod calc;
pub mod interval;

#[cfg(test)]
pub mod tests;

pub use calc::SummaryStat;
pub use interval::{TimeSummaryInterval, hhmmss_to_secs, secs_to_hhmmss};

use crate::error::{PointObsError, Result};
use crate::models::{Observation, SummaryAttributes, count_headers};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// What the writer needs from a summarization pass
pub trait SummaryAdapter {
    /// Summary rows with header indices assigned by header change
    fn summaries(&self) -> &[Observation];

    /// Distinct header rows among [`summaries`](Self::summaries)
    fn summary_header_count(&self) -> usize;

    /// Whether raw observations are written ahead of the summaries
    fn keep_raw(&self) -> bool;

    /// Global attributes recording the summary settings
    fn attributes(&self) -> Option<SummaryAttributes> {
        None
    }
}

/// Settings of a time summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSummaryInfo {
    /// Start of the daily window, seconds of day
    pub begin: i32,
    /// End of the daily window, seconds of day
    pub end: i32,
    /// Seconds between base times
    pub step: i32,
    /// Seconds of window before the base time
    pub width_beg: i32,
    /// Seconds of window after the base time
    pub width_end: i32,
    /// GRIB codes to summarize; empty with `obs_vars` empty means all
    pub grib_codes: Vec<i32>,
    /// Variable names to summarize
    pub obs_vars: Vec<String>,
    /// Statistic names: mean, stdev, min, max, range, median, pNN
    pub types: Vec<String>,
    /// Expected seconds between valid observations; 0 disables the check
    pub vld_freq: i32,
    /// Minimum ratio of valid to expected observations
    pub vld_thresh: f64,
    /// Also write the raw observations
    pub keep_raw: bool,
}

impl Default for TimeSummaryInfo {
    fn default() -> Self {
        Self {
            begin: 0,
            end: 86_399,
            step: 300,
            width_beg: 300,
            width_end: 300,
            grib_codes: Vec::new(),
            obs_vars: Vec::new(),
            types: ["min", "max", "range", "mean", "stdev", "median", "p80"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vld_freq: 0,
            vld_thresh: 0.0,
            keep_raw: false,
        }
    }
}

impl TimeSummaryInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daily window from `begin` to `end`, both `HHMMSS`
    pub fn with_window(mut self, begin: &str, end: &str) -> Result<Self> {
        self.begin = hhmmss_to_secs(begin)?;
        self.end = hhmmss_to_secs(end)?;
        Ok(self)
    }

    pub fn with_step(mut self, step: i32) -> Self {
        self.step = step;
        self
    }

    /// Window centred on the base time
    pub fn with_width(mut self, width: i32) -> Self {
        self.width_beg = width / 2;
        self.width_end = width - width / 2;
        self
    }

    /// Asymmetric window around the base time
    pub fn with_width_bounds(mut self, before: i32, after: i32) -> Self {
        self.width_beg = before;
        self.width_end = after;
        self
    }

    pub fn with_grib_codes(mut self, codes: Vec<i32>) -> Self {
        self.grib_codes = codes;
        self
    }

    pub fn with_obs_vars(mut self, names: Vec<String>) -> Self {
        self.obs_vars = names;
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    pub fn with_valid_data(mut self, freq: i32, thresh: f64) -> Self {
        self.vld_freq = freq;
        self.vld_thresh = thresh;
        self
    }

    pub fn with_keep_raw(mut self, keep_raw: bool) -> Self {
        self.keep_raw = keep_raw;
        self
    }

    /// Total window width in seconds
    pub fn width(&self) -> i32 {
        self.width_beg + self.width_end
    }

    /// Validate configuration settings
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.step <= 0 {
            return Err("Summary step must be greater than 0".to_string());
        }
        if self.width_beg < 0 || self.width_end < 0 || self.width() == 0 {
            return Err("Summary width must be positive".to_string());
        }
        if !(0..interval::SECONDS_PER_DAY as i32).contains(&self.begin)
            || !(0..interval::SECONDS_PER_DAY as i32).contains(&self.end)
        {
            return Err("Summary window must lie within one day".to_string());
        }
        if self.types.is_empty() {
            return Err("At least one summary type is required".to_string());
        }
        if self.vld_thresh < 0.0 || self.vld_thresh > 1.0 {
            return Err("Valid data threshold must be between 0 and 1".to_string());
        }
        Ok(())
    }

    /// Parsed statistics, in configured order
    pub fn stats(&self) -> Result<Vec<SummaryStat>> {
        self.types.iter().map(|t| t.parse()).collect()
    }

    /// True when the observation's variable is selected for summarizing
    pub fn selects(&self, obs: &Observation) -> bool {
        (self.grib_codes.is_empty() && self.obs_vars.is_empty())
            || self.grib_codes.contains(&obs.var_code)
            || self.obs_vars.iter().any(|name| *name == obs.var_name)
    }

    /// Attributes written alongside summarized output
    pub fn to_attributes(&self) -> SummaryAttributes {
        SummaryAttributes {
            begin: secs_to_hhmmss(self.begin),
            end: secs_to_hhmmss(self.end),
            step: self.step,
            width: self.width(),
            grib_codes: self.grib_codes.clone(),
            obs_vars: self.obs_vars.clone(),
            types: self.types.clone(),
        }
    }

    fn passes_valid_data(&self, n_valid: usize) -> bool {
        if self.vld_freq <= 0 || self.vld_thresh <= 0.0 {
            return true;
        }
        let n_expect = ((self.width() as f64 / self.vld_freq as f64).round() as i64).max(1);
        (n_valid as f64 / n_expect as f64) >= self.vld_thresh
    }
}

/// Observations sharing every field but the value fall into one group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SummaryKey<'a> {
    header_type: &'a str,
    station_id: &'a str,
    latitude: u32,
    longitude: u32,
    elevation: u32,
    var_code: i32,
    height: u32,
    pressure_level: u32,
    var_name: &'a str,
}

impl<'a> SummaryKey<'a> {
    fn of(obs: &'a Observation) -> Self {
        Self {
            header_type: &obs.header_type,
            station_id: &obs.station_id,
            latitude: obs.latitude.to_bits(),
            longitude: obs.longitude.to_bits(),
            elevation: obs.elevation.to_bits(),
            var_code: obs.var_code,
            height: obs.height.to_bits(),
            pressure_level: obs.pressure_level.to_bits(),
            var_name: &obs.var_name,
        }
    }
}

/// Header type of a summary row: `<type>_<stat>_<HHMMSS width>`
pub fn summary_header_type(header_type: &str, stat: SummaryStat, width: i32) -> String {
    format!("{header_type}_{stat}_{}", secs_to_hhmmss(width))
}

/// Result of a time summary pass
#[derive(Debug, Clone)]
pub struct TimeSummary {
    summaries: Vec<Observation>,
    header_count: usize,
    keep_raw: bool,
    attributes: SummaryAttributes,
}

impl TimeSummary {
    /// Summarize `observations` according to `info`.
    ///
    /// Observations are ordered by valid time (stable), windows are visited
    /// in base-time order and groups within a window in first-seen order.
    pub fn summarize(observations: &[Observation], info: &TimeSummaryInfo) -> Result<Self> {
        info.validate().map_err(PointObsError::configuration)?;
        let stats = info.stats()?;

        let mut sorted: Vec<&Observation> = observations.iter().collect();
        sorted.sort_by_key(|obs| obs.valid_time);

        let mut summaries = Vec::new();
        if let (Some(first), Some(last)) = (sorted.first(), sorted.last()) {
            let intervals = interval::time_intervals(
                first.valid_time,
                last.valid_time,
                info.begin,
                info.end,
                info.step,
                info.width_beg,
                info.width_end,
            );
            let mut skipped = 0usize;

            for window in &intervals {
                let lo = sorted.partition_point(|obs| obs.valid_time < window.start_time());
                let hi = sorted.partition_point(|obs| obs.valid_time < window.end_time());

                // Groups are emitted in first-seen order, not sorted by key
                let mut lookup: HashMap<SummaryKey<'_>, usize> = HashMap::new();
                let mut groups: Vec<(&Observation, Vec<f32>)> = Vec::new();
                for &obs in sorted[lo..hi].iter().filter(|obs| info.selects(obs)) {
                    let slot = *lookup.entry(SummaryKey::of(obs)).or_insert_with(|| {
                        groups.push((obs, Vec::new()));
                        groups.len() - 1
                    });
                    groups[slot].1.push(obs.value);
                }

                for (key_obs, values) in &groups {
                    if !info.passes_valid_data(calc::valid_count(values)) {
                        debug!(
                            "Skipping time summary for {} {} at {}: {} valid values",
                            key_obs.header_type,
                            key_obs.station_id,
                            window.base_time(),
                            calc::valid_count(values)
                        );
                        skipped += stats.len();
                        continue;
                    }
                    for stat in &stats {
                        summaries.push(Observation::new(
                            summary_header_type(&key_obs.header_type, *stat, info.width()),
                            key_obs.station_id.clone(),
                            window.base_time(),
                            key_obs.latitude,
                            key_obs.longitude,
                            key_obs.elevation,
                            "",
                            key_obs.var_code,
                            key_obs.pressure_level,
                            key_obs.height,
                            stat.compute(values),
                            key_obs.var_name.clone(),
                        ));
                    }
                }
            }
            debug!(
                "Time summary: {} windows, {} summary rows, {} skipped",
                intervals.len(),
                summaries.len(),
                skipped
            );
        }

        let header_count = count_headers(&mut summaries);
        Ok(Self {
            summaries,
            header_count,
            keep_raw: info.keep_raw,
            attributes: info.to_attributes(),
        })
    }

    pub fn into_summaries(self) -> Vec<Observation> {
        self.summaries
    }
}

impl SummaryAdapter for TimeSummary {
    fn summaries(&self) -> &[Observation] {
        &self.summaries
    }

    fn summary_header_count(&self) -> usize {
        self.header_count
    }

    fn keep_raw(&self) -> bool {
        self.keep_raw
    }

    fn attributes(&self) -> Option<SummaryAttributes> {
        Some(self.attributes.clone())
    }
}
