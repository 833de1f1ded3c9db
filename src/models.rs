//! Core data structures shared by the writer, reader and summary adapter.
//!
//! Defines the observation record, the layout and variable-id enums,
//! variable tables, summary attributes and write statistics.

use crate::constants::{NA_QUALITY, OBS_VERSION_V1_0, OBS_VERSION_V1_2};
use crate::dictionary::DictionaryTable;
use crate::error::{PointObsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// On-disk layout of a point observation file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatVersion {
    /// Legacy layout: combined numeric arrays and per-row strings
    V1_0,
    /// Dictionary-encoded layout
    V1_2,
}

impl FormatVersion {
    /// Value of the version global attribute
    pub fn attribute_value(&self) -> &'static str {
        match self {
            FormatVersion::V1_0 => OBS_VERSION_V1_0,
            FormatVersion::V1_2 => OBS_VERSION_V1_2,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::V1_0 => write!(f, "V1.0"),
            FormatVersion::V1_2 => write!(f, "V1.2"),
        }
    }
}

/// How the per-observation variable column is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableIdMode {
    /// GRIB code of the observed quantity (`obs_gc`)
    GribCode,
    /// Index into the variable name table (`obs_vid`)
    VariableIndex,
}

impl VariableIdMode {
    pub fn from_use_var_id(use_var_id: bool) -> Self {
        if use_var_id {
            VariableIdMode::VariableIndex
        } else {
            VariableIdMode::GribCode
        }
    }

    pub fn use_var_id(&self) -> bool {
        matches!(self, VariableIdMode::VariableIndex)
    }
}

/// A single point observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub header_type: String,
    pub station_id: String,
    /// Unix seconds, UTC
    pub valid_time: i64,
    pub latitude: f32,
    pub longitude: f32,
    pub elevation: f32,
    pub quality_flag: String,
    /// GRIB code or variable table index, depending on the file mode
    pub var_code: i32,
    pub pressure_level: f32,
    pub height: f32,
    pub value: f32,
    pub var_name: String,
    /// Header row this observation belongs to
    pub header_index: usize,
}

impl Observation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        header_type: impl Into<String>,
        station_id: impl Into<String>,
        valid_time: i64,
        latitude: f32,
        longitude: f32,
        elevation: f32,
        quality_flag: impl Into<String>,
        var_code: i32,
        pressure_level: f32,
        height: f32,
        value: f32,
        var_name: impl Into<String>,
    ) -> Self {
        let quality_flag = quality_flag.into();
        Self {
            header_type: header_type.into(),
            station_id: station_id.into(),
            valid_time,
            latitude,
            longitude,
            elevation,
            quality_flag: if quality_flag.is_empty() {
                NA_QUALITY.to_string()
            } else {
                quality_flag
            },
            var_code,
            pressure_level,
            height,
            value,
            var_name: var_name.into(),
            header_index: 0,
        }
    }

    /// Set the header row index
    pub fn with_header_index(mut self, header_index: usize) -> Self {
        self.header_index = header_index;
        self
    }

    /// True when both observations share message type, station, time and location
    pub fn has_same_header(&self, other: &Observation) -> bool {
        self.header_type == other.header_type
            && self.station_id == other.station_id
            && self.valid_time == other.valid_time
            && self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.elevation == other.elevation
    }
}

/// Assign consecutive header indices, starting a new header whenever the
/// header fields change from the previous observation. Returns the header count.
pub fn count_headers(observations: &mut [Observation]) -> usize {
    let mut count = 0;
    let mut previous: Option<usize> = None;
    for i in 0..observations.len() {
        let same = previous.is_some_and(|p| observations[i].has_same_header(&observations[p]));
        if !same {
            count += 1;
            previous = Some(i);
        }
        observations[i].header_index = count - 1;
    }
    debug!(
        "count_headers: {} observations, {} headers",
        observations.len(),
        count
    );
    count
}

/// PrepBufr report triplet attached to a raw header row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReport {
    pub pb_report_type: i32,
    pub in_report_type: i32,
    pub instrument_type: i32,
}

/// Variable names, units and descriptions for variable-index mode
#[derive(Debug, Clone)]
pub struct VariableTable {
    names: DictionaryTable<String>,
    units: Vec<String>,
    descriptions: Vec<String>,
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableTable {
    pub fn new() -> Self {
        Self {
            names: DictionaryTable::new("variable table"),
            units: Vec::new(),
            descriptions: Vec::new(),
        }
    }

    /// Add a variable, returning its index. Units and description of an
    /// existing name are left untouched.
    pub fn add(&mut self, name: &str, unit: &str, description: &str) -> usize {
        let before = self.names.len();
        let index = self.names.intern(name);
        if index == before {
            self.units.push(unit.to_string());
            self.descriptions.push(description.to_string());
        }
        index
    }

    /// Intern every observation's variable name and rewrite its `var_code`
    /// to the table index
    pub fn assign_ids(&mut self, observations: &mut [Observation]) -> Result<()> {
        for obs in observations.iter_mut() {
            if obs.var_name.is_empty() {
                return Err(PointObsError::configuration(format!(
                    "observation for station {} has no variable name",
                    obs.station_id
                )));
            }
            let index = self.add(&obs.var_name, "", "");
            obs.var_code = i32::try_from(index)
                .map_err(|_| PointObsError::out_of_range("variable table", index, self.len()))?;
        }
        Ok(())
    }

    pub fn name(&self, index: usize) -> Result<&str> {
        self.names.resolve(index).map(String::as_str)
    }

    pub fn unit(&self, index: usize) -> Option<&str> {
        self.units.get(index).map(String::as_str)
    }

    pub fn description(&self, index: usize) -> Option<&str> {
        self.descriptions.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        self.names.values()
    }

    pub fn units(&self) -> &[String] {
        &self.units
    }

    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    /// True when any unit or description carries text
    pub fn has_metadata(&self) -> bool {
        self.units.iter().any(|u| !u.is_empty()) || self.descriptions.iter().any(|d| !d.is_empty())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Global attributes describing an applied time summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryAttributes {
    /// Window start as HHMMSS
    pub begin: String,
    /// Window end as HHMMSS
    pub end: String,
    pub step: i32,
    pub width: i32,
    pub grib_codes: Vec<i32>,
    pub obs_vars: Vec<String>,
    pub types: Vec<String>,
}

/// Statistics returned by a finalized write session
#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    pub observations_written: usize,
    pub headers_written: usize,
    pub raw_headers_written: usize,
    pub message_types: usize,
    pub stations: usize,
    pub valid_times: usize,
    pub quality_flags: usize,
    pub variables: usize,
    pub buffer_flushes: usize,
    pub bytes_written: u64,
}

impl WriteSummary {
    /// Mean observations per header row
    pub fn observations_per_header(&self) -> f64 {
        if self.headers_written == 0 {
            0.0
        } else {
            self.observations_written as f64 / self.headers_written as f64
        }
    }

    /// Format bytes in human-readable format
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", bytes, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
