//! Point Observation Store
//!
//! A Rust library for writing and reading point observations (surface
//! reports, soundings, aircraft and satellite retrievals) in a
//! dictionary-encoded layout in NetCDF classic (64-bit offset) files.
//!
//! This library provides tools for:
//! - Interning repeated header strings into dictionary tables
//! - Registering deduplicated observation headers with optional PrepBufr reports
//! - Buffered, bounded-memory observation writing with atomic publish
//! - Reading the current indexed layout (V1.2) and the legacy array layout (V1.0)
//! - Time-window summaries written alongside or instead of raw reports
//!
//! # Example
//!
//! ```no_run
//! use point_obs_nc::{Observation, PointObsReader, PointObsWriter, WriterConfig, count_headers};
//!
//! # fn main() -> point_obs_nc::Result<()> {
//! let mut observations = vec![Observation::new(
//!     "ADPSFC", "KDEN", 1_609_459_200, 39.8, -104.7, 1650.0, "0", 11, 1000.0, 2.0, -5.25, "TMP",
//! )];
//! count_headers(&mut observations);
//!
//! let mut writer = PointObsWriter::create("obs.nc", WriterConfig::default())?;
//! writer.write_observations(&observations)?;
//! writer.finalize(Some(observations.len()), None, None)?;
//!
//! let mut reader = PointObsReader::open("obs.nc")?;
//! let decoded = reader.read_observations(0, reader.obs_count())?;
//! assert_eq!(decoded[0].station_id, "KDEN");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod dictionary;
pub mod error;
pub mod header;
pub mod models;
pub mod point_obs;
pub mod summary;

// Re-export commonly used types
pub use config::{ReaderConfig, WriterConfig};
pub use dictionary::DictionaryTable;
pub use error::{ErrorKind, PointObsError, Result};
pub use header::HeaderRegistry;
pub use models::{
    FormatVersion, Observation, RawReport, SummaryAttributes, VariableIdMode, VariableTable,
    WriteSummary, count_headers,
};
pub use point_obs::{PointObsReader, PointObsWriter, detect_version, rewrite};
pub use summary::{SummaryAdapter, SummaryStat, TimeSummary, TimeSummaryInfo};
