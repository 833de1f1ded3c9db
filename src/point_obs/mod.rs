//! Point observation files
//!
//! [`PointObsWriter`] turns a stream of observations into a
//! dictionary-encoded file; [`PointObsReader`] reads V1.2 and legacy V1.0
//! files back into the same in-memory shapes.

pub mod buffer;
mod layout;
pub mod reader;
mod text;
pub mod writer;

#[cfg(test)]
pub mod tests;

pub use buffer::ObservationBuffer;
pub use reader::{ObservationIter, PointObsReader};
pub use writer::PointObsWriter;

use crate::config::WriterConfig;
use crate::error::{PointObsError, Result};
use crate::models::{FormatVersion, WriteSummary};
use std::path::Path;
use tracing::debug;

/// Detect the layout of the file at `path`
pub fn detect_version(path: impl AsRef<Path>) -> Result<FormatVersion> {
    let path = path.as_ref();
    let nc = netcdf::open(path).map_err(|e| PointObsError::netcdf_at(path, e))?;
    reader::layout_version(&nc)
}

/// Copy every header, observation and table of an open file into a new
/// file written with `config`. Header rows keep their order, so header
/// indices are preserved.
pub fn rewrite(
    source: &mut PointObsReader,
    output: impl AsRef<Path>,
    config: WriterConfig,
) -> Result<WriteSummary> {
    let config = config.with_variable_id_mode(source.variable_id_mode());
    let mut writer = PointObsWriter::create(output, config)?;

    let headers = source.read_headers()?.clone();
    for i in 0..headers.len() {
        let header = headers.header(i)?;
        writer.register_header(
            header.message_type,
            header.station_id,
            header.valid_time,
            header.latitude,
            header.longitude,
            header.elevation,
        )?;
    }
    for report in headers.raw_reports() {
        writer.register_header_raw_report(
            report.pb_report_type,
            report.in_report_type,
            report.instrument_type,
        );
    }

    let total = source.obs_count();
    for obs in source.observations() {
        let obs = obs?;
        writer.stage(
            obs.header_index,
            obs.var_code,
            obs.pressure_level,
            obs.height,
            obs.value,
            &obs.quality_flag,
        )?;
    }

    if let Some(attributes) = source.summary_attributes()? {
        writer.set_summary_attributes(attributes);
    }
    let variables = source.variable_table()?.cloned();
    debug!("Rewriting {} observations from {}", total, source.path().display());

    writer.finalize(Some(total), Some(headers.len()), variables.as_ref())
}
