//! Header row registry.
//!
//! Message types, station ids and valid times are dictionary encoded; each
//! header row stores one index per dictionary plus its location verbatim.
//! The reader rebuilds the same structure from a file, so downstream code
//! never sees which layout a file used.

use crate::constants::{HEADER_STR_LEN2, VALID_TIME_FORMAT};
use crate::dictionary::DictionaryTable;
use crate::error::{PointObsError, Result};
use crate::models::RawReport;
use chrono::{DateTime, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Format unix seconds as `YYYYMMDD_HHMMSS` (UTC)
pub fn format_valid_time(unix_seconds: i64) -> Result<String> {
    DateTime::from_timestamp(unix_seconds, 0)
        .map(|t| t.format(VALID_TIME_FORMAT).to_string())
        .ok_or_else(|| PointObsError::format(format!("valid time {unix_seconds} out of range")))
}

/// Parse a `YYYYMMDD_HHMMSS` string (UTC) into unix seconds
pub fn parse_valid_time(text: &str) -> Result<i64> {
    NaiveDateTime::parse_from_str(text.trim(), VALID_TIME_FORMAT)
        .map(|t| t.and_utc().timestamp())
        .map_err(|e| PointObsError::format(format!("invalid valid time '{text}': {e}")))
}

/// Cut `value` to at most `width` bytes on a character boundary. Files
/// store strings in fixed-width rows, so this is the form that reads back.
pub(crate) fn fit_width<'a>(value: &'a str, width: usize, what: &str) -> &'a str {
    if value.len() <= width {
        return value;
    }
    let mut end = width;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        "{what} '{value}' exceeds {width} bytes, storing '{}'",
        &value[..end]
    );
    &value[..end]
}

/// Resolved view of one header row
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord<'a> {
    pub message_type: &'a str,
    pub station_id: &'a str,
    pub valid_time: i64,
    pub latitude: f32,
    pub longitude: f32,
    pub elevation: f32,
}

/// Dictionary-encoded header rows
#[derive(Debug, Clone)]
pub struct HeaderRegistry {
    types: DictionaryTable<String>,
    stations: DictionaryTable<String>,
    valid_times: DictionaryTable<String>,
    /// Unix seconds of each valid time table entry
    valid_seconds: Vec<i64>,
    time_index: HashMap<i64, usize>,
    time_range: Option<(i64, i64)>,

    typ_idx: Vec<usize>,
    sid_idx: Vec<usize>,
    vld_idx: Vec<usize>,
    lat: Vec<f32>,
    lon: Vec<f32>,
    elv: Vec<f32>,

    raw_reports: Vec<RawReport>,
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderRegistry {
    pub fn new() -> Self {
        Self {
            types: DictionaryTable::new("message type table"),
            stations: DictionaryTable::new("station table"),
            valid_times: DictionaryTable::new("valid time table"),
            valid_seconds: Vec::new(),
            time_index: HashMap::new(),
            time_range: None,
            typ_idx: Vec::new(),
            sid_idx: Vec::new(),
            vld_idx: Vec::new(),
            lat: Vec::new(),
            lon: Vec::new(),
            elv: Vec::new(),
            raw_reports: Vec::new(),
        }
    }

    /// Append a header row and return its index. Message types and station
    /// ids longer than the file's string width are interned truncated.
    pub fn register_header(
        &mut self,
        message_type: &str,
        station_id: &str,
        valid_time: i64,
        latitude: f32,
        longitude: f32,
        elevation: f32,
    ) -> Result<usize> {
        let vld = self.intern_valid_time(valid_time)?;
        let message_type = fit_width(message_type, HEADER_STR_LEN2, "message type");
        let station_id = fit_width(station_id, HEADER_STR_LEN2, "station id");
        self.typ_idx.push(self.types.intern(message_type));
        self.sid_idx.push(self.stations.intern(station_id));
        self.vld_idx.push(vld);
        self.lat.push(latitude);
        self.lon.push(longitude);
        self.elv.push(elevation);
        Ok(self.len() - 1)
    }

    /// Append the PrepBufr report triplet for the next raw header row
    pub fn register_header_raw_report(
        &mut self,
        pb_report_type: i32,
        in_report_type: i32,
        instrument_type: i32,
    ) {
        self.raw_reports.push(RawReport {
            pb_report_type,
            in_report_type,
            instrument_type,
        });
    }

    fn intern_valid_time(&mut self, valid_time: i64) -> Result<usize> {
        let novel = match self.time_range {
            None => true,
            Some((lo, hi)) if valid_time < lo || valid_time > hi => true,
            Some(_) => !self.time_index.contains_key(&valid_time),
        };
        if !novel {
            if let Some(&index) = self.time_index.get(&valid_time) {
                return Ok(index);
            }
        }

        let text = format_valid_time(valid_time)?;
        let before = self.valid_times.len();
        let index = self.valid_times.intern(text.as_str());
        if index == before {
            self.valid_seconds.push(valid_time);
        }
        self.time_index.insert(valid_time, index);
        self.time_range = Some(match self.time_range {
            None => (valid_time, valid_time),
            Some((lo, hi)) => (lo.min(valid_time), hi.max(valid_time)),
        });
        Ok(index)
    }

    /// Rebuild a registry from decoded dictionary tables and index columns
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_columns(
        types: Vec<String>,
        stations: Vec<String>,
        valid_times: Vec<String>,
        typ_idx: Vec<usize>,
        sid_idx: Vec<usize>,
        vld_idx: Vec<usize>,
        lat: Vec<f32>,
        lon: Vec<f32>,
        elv: Vec<f32>,
        raw_reports: Vec<RawReport>,
    ) -> Result<Self> {
        let rows = typ_idx.len();
        if [sid_idx.len(), vld_idx.len(), lat.len(), lon.len(), elv.len()]
            .iter()
            .any(|&n| n != rows)
        {
            return Err(PointObsError::format(
                "header columns have mismatched lengths",
            ));
        }

        // Table rows stay where the file put them, even repeated ones
        let mut registry = Self::new();
        registry.types = DictionaryTable::from_values("message type table", types);
        registry.stations = DictionaryTable::from_values("station table", stations);
        for (index, text) in valid_times.iter().enumerate() {
            let seconds = parse_valid_time(text)?;
            registry.valid_seconds.push(seconds);
            registry.time_index.entry(seconds).or_insert(index);
            registry.time_range = Some(match registry.time_range {
                None => (seconds, seconds),
                Some((lo, hi)) => (lo.min(seconds), hi.max(seconds)),
            });
        }
        registry.valid_times = DictionaryTable::from_values("valid time table", valid_times);

        for (column, table) in [
            (&typ_idx, &registry.types),
            (&sid_idx, &registry.stations),
            (&vld_idx, &registry.valid_times),
        ] {
            if let Some(&bad) = column.iter().find(|&&i| i >= table.len()) {
                return Err(PointObsError::out_of_range(table.name(), bad, table.len()));
            }
        }

        registry.typ_idx = typ_idx;
        registry.sid_idx = sid_idx;
        registry.vld_idx = vld_idx;
        registry.lat = lat;
        registry.lon = lon;
        registry.elv = elv;
        registry.raw_reports = raw_reports;

        debug!(
            "Rebuilt header registry: {} rows, {} types, {} stations, {} times",
            registry.len(),
            registry.types.len(),
            registry.stations.len(),
            registry.valid_times.len()
        );
        Ok(registry)
    }

    /// Resolve header row `index`
    pub fn header(&self, index: usize) -> Result<HeaderRecord<'_>> {
        if index >= self.len() {
            return Err(PointObsError::out_of_range("header", index, self.len()));
        }
        let vld = self.vld_idx[index];
        Ok(HeaderRecord {
            message_type: self.types.resolve(self.typ_idx[index])?,
            station_id: self.stations.resolve(self.sid_idx[index])?,
            valid_time: *self.valid_seconds.get(vld).ok_or_else(|| {
                PointObsError::out_of_range("valid time table", vld, self.valid_seconds.len())
            })?,
            latitude: self.lat[index],
            longitude: self.lon[index],
            elevation: self.elv[index],
        })
    }

    /// PrepBufr triplet of header row `index`, if it is a raw row
    pub fn raw_report(&self, index: usize) -> Option<RawReport> {
        self.raw_reports.get(index).copied()
    }

    /// Header rows registered so far
    pub fn len(&self) -> usize {
        self.typ_idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typ_idx.is_empty()
    }

    /// Rows carrying a PrepBufr triplet
    pub fn raw_header_count(&self) -> usize {
        self.raw_reports.len()
    }

    pub fn types(&self) -> &DictionaryTable<String> {
        &self.types
    }

    pub fn stations(&self) -> &DictionaryTable<String> {
        &self.stations
    }

    pub fn valid_times(&self) -> &DictionaryTable<String> {
        &self.valid_times
    }

    /// Earliest and latest valid time registered
    pub fn time_range(&self) -> Option<(i64, i64)> {
        self.time_range
    }

    pub fn type_indices(&self) -> &[usize] {
        &self.typ_idx
    }

    pub fn station_indices(&self) -> &[usize] {
        &self.sid_idx
    }

    pub fn valid_time_indices(&self) -> &[usize] {
        &self.vld_idx
    }

    pub fn latitudes(&self) -> &[f32] {
        &self.lat
    }

    pub fn longitudes(&self) -> &[f32] {
        &self.lon
    }

    pub fn elevations(&self) -> &[f32] {
        &self.elv
    }

    pub fn raw_reports(&self) -> &[RawReport] {
        &self.raw_reports
    }
}
