//! Point observation writer
//!
//! Owns the header registry, the quality flag table and the observation
//! buffer for one output file. Observation rows stream out through the
//! buffer as it fills; header rows and dictionary tables are written by
//! [`PointObsWriter::finalize`] once their final sizes are known.

use super::buffer::ObservationBuffer;
use super::layout::{Layout, Tables};
use crate::config::WriterConfig;
use crate::constants::{HEADER_STR_LEN, NA_QUALITY};
use crate::dictionary::DictionaryTable;
use crate::error::{PointObsError, Result};
use crate::header::{HeaderRegistry, fit_width};
use crate::models::{Observation, SummaryAttributes, VariableIdMode, VariableTable, WriteSummary};
use crate::summary::SummaryAdapter;
use netcdf::{FileMut, Options};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Write session for one point observation file
#[derive(Debug)]
pub struct PointObsWriter {
    config: WriterConfig,
    // Declared before `staging` so the file is closed before it is removed
    nc: FileMut,
    staging: NamedTempFile,
    destination: PathBuf,
    layout: Layout,
    headers: HeaderRegistry,
    quality: DictionaryTable<String>,
    buffer: ObservationBuffer,
    summary_attributes: Option<SummaryAttributes>,
}

impl PointObsWriter {
    /// Start a write session for `path`. The file is built in a temporary
    /// file beside it; nothing appears at `path` until
    /// [`finalize`](Self::finalize) succeeds.
    pub fn create(path: impl AsRef<Path>, config: WriterConfig) -> Result<Self> {
        config.validate().map_err(PointObsError::configuration)?;

        let destination = path.as_ref().to_path_buf();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".point-obs-")
            .suffix(".nc.tmp")
            .tempfile_in(dir)
            .map_err(|e| PointObsError::io_at(dir, e))?;

        let mut nc = netcdf::create_with(staging.path(), Options::_64BIT_OFFSET)
            .map_err(|e| PointObsError::netcdf_at(staging.path(), e))?;
        let layout = Layout::define(&mut nc, &config)?;
        nc.enddef()?;
        debug!(
            "Created {} writer for {} (buffer {} rows, {:?})",
            layout.version(),
            destination.display(),
            config.buffer_size,
            config.variable_id_mode
        );

        Ok(Self {
            buffer: ObservationBuffer::new(config.buffer_size),
            config,
            nc,
            staging,
            destination,
            layout,
            headers: HeaderRegistry::new(),
            quality: DictionaryTable::new("quality flag table"),
            summary_attributes: None,
        })
    }

    /// Where the file is published
    pub fn path(&self) -> &Path {
        &self.destination
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Header rows registered so far
    pub fn headers(&self) -> &HeaderRegistry {
        &self.headers
    }

    pub fn quality_flags(&self) -> &DictionaryTable<String> {
        &self.quality
    }

    /// Observation rows flushed or staged so far
    pub fn observation_count(&self) -> usize {
        self.buffer.total_rows()
    }

    /// Register a header row; see [`HeaderRegistry::register_header`]
    pub fn register_header(
        &mut self,
        message_type: &str,
        station_id: &str,
        valid_time: i64,
        latitude: f32,
        longitude: f32,
        elevation: f32,
    ) -> Result<usize> {
        self.headers
            .register_header(message_type, station_id, valid_time, latitude, longitude, elevation)
    }

    /// Attach the PrepBufr report triplet of the next raw header row
    pub fn register_header_raw_report(
        &mut self,
        pb_report_type: i32,
        in_report_type: i32,
        instrument_type: i32,
    ) {
        self.headers
            .register_header_raw_report(pb_report_type, in_report_type, instrument_type);
    }

    /// Stage one observation row. The referenced header must already be
    /// registered. Flushes when the buffer reaches its threshold.
    ///
    /// An empty quality flag is stored as `NA`; flags longer than the
    /// file's short string width are interned truncated.
    pub fn stage(
        &mut self,
        header_index: usize,
        variable_id: i32,
        level: f32,
        height: f32,
        value: f32,
        quality_flag: &str,
    ) -> Result<()> {
        if header_index >= self.headers.len() {
            return Err(PointObsError::state(format!(
                "observation references header {header_index} but only {} headers are registered",
                self.headers.len()
            )));
        }
        let header_index = i32::try_from(header_index)
            .map_err(|_| PointObsError::out_of_range("header", header_index, i32::MAX as usize))?;

        let flag = if quality_flag.is_empty() { NA_QUALITY } else { quality_flag };
        let quality_index = self
            .quality
            .intern(fit_width(flag, HEADER_STR_LEN, "quality flag"));
        let quality_index = i32::try_from(quality_index).map_err(|_| {
            PointObsError::out_of_range(self.quality.name(), quality_index, i32::MAX as usize)
        })?;

        if self
            .buffer
            .push(header_index, variable_id, quality_index, level, height, value)
        {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the staged rows at the running offset and reset the buffer
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.layout
            .write_observations(&mut self.nc, &self.buffer, &self.quality)?;
        debug!(
            "Flushed {} observations at offset {}",
            self.buffer.len(),
            self.buffer.offset()
        );
        self.buffer.advance();
        Ok(())
    }

    /// Register headers and stage a run of observations.
    ///
    /// A new header row is registered whenever an observation's
    /// `header_index` differs from the previous one, so indices assigned by
    /// [`count_headers`](crate::models::count_headers) map onto rows that
    /// continue after any headers already registered. Returns the number of
    /// header rows registered by this call.
    pub fn write_observations(&mut self, observations: &[Observation]) -> Result<usize> {
        let headers_before = self.headers.len();
        let mut previous: Option<&Observation> = None;
        let mut current = 0usize;

        for obs in observations {
            match previous {
                Some(prev) if prev.header_index == obs.header_index => {
                    if self.config.verify_header_linkage && !prev.has_same_header(obs) {
                        return Err(PointObsError::state(format!(
                            "observations sharing header {} disagree on header fields \
                             ({} {} vs {} {})",
                            obs.header_index,
                            prev.station_id,
                            prev.valid_time,
                            obs.station_id,
                            obs.valid_time
                        )));
                    }
                }
                _ => {
                    current = self.register_header(
                        &obs.header_type,
                        &obs.station_id,
                        obs.valid_time,
                        obs.latitude,
                        obs.longitude,
                        obs.elevation,
                    )?;
                }
            }
            self.stage(
                current,
                obs.var_code,
                obs.pressure_level,
                obs.height,
                obs.value,
                &obs.quality_flag,
            )?;
            previous = Some(obs);
        }

        let registered = self.headers.len() - headers_before;
        debug!(
            "Staged {} observations under {} new headers",
            observations.len(),
            registered
        );
        Ok(registered)
    }

    /// Write raw observations (unless the adapter drops them) followed by
    /// the adapter's summary rows, and record its summary attributes
    pub fn write_with_summary(
        &mut self,
        raw: &[Observation],
        adapter: &dyn SummaryAdapter,
    ) -> Result<()> {
        if adapter.keep_raw() {
            self.write_observations(raw)?;
        } else {
            debug!("Dropping {} raw observations in favour of summaries", raw.len());
        }

        let registered = self.write_observations(adapter.summaries())?;
        if registered != adapter.summary_header_count() {
            warn!(
                "Summary adapter reported {} headers but {} were registered",
                adapter.summary_header_count(),
                registered
            );
        }
        if let Some(attributes) = adapter.attributes() {
            self.set_summary_attributes(attributes);
        }
        Ok(())
    }

    /// Record the time summary global attributes written at finalize
    pub fn set_summary_attributes(&mut self, attributes: SummaryAttributes) {
        self.summary_attributes = Some(attributes);
    }

    /// Flush the remaining rows, write header rows and dictionary tables and
    /// publish the file.
    ///
    /// `obs_count` and `hdr_count`, when given, must match the rows actually
    /// staged and registered. A writer in variable-index mode needs a
    /// non-empty `variables` table to name its indices.
    pub fn finalize(
        mut self,
        obs_count: Option<usize>,
        hdr_count: Option<usize>,
        variables: Option<&VariableTable>,
    ) -> Result<WriteSummary> {
        self.flush()?;
        let rows = self.buffer.offset();

        if let Some(expected) = obs_count {
            if expected != rows {
                return Err(PointObsError::configuration(format!(
                    "declared {expected} observations but {rows} were staged"
                )));
            }
        }
        if self.headers.is_empty() {
            return Err(PointObsError::configuration(
                "cannot finalize a file without header rows",
            ));
        }
        if let Some(expected) = hdr_count {
            if expected != self.headers.len() {
                return Err(PointObsError::configuration(format!(
                    "declared {expected} headers but {} were registered",
                    self.headers.len()
                )));
            }
        }
        if self.headers.raw_header_count() > self.headers.len() {
            return Err(PointObsError::configuration(format!(
                "{} raw report triplets for {} header rows",
                self.headers.raw_header_count(),
                self.headers.len()
            )));
        }
        let variables = variables.filter(|table| !table.is_empty());
        if variables.is_none() && self.config.variable_id_mode == VariableIdMode::VariableIndex {
            return Err(PointObsError::configuration(
                "variable-index mode needs a non-empty variable name table",
            ));
        }

        let tables = Tables {
            headers: &self.headers,
            quality: &self.quality,
            variables,
            summary: self.summary_attributes.as_ref(),
        };
        self.nc.redef()?;
        self.layout.define_tables(&mut self.nc, &tables)?;
        self.nc.enddef()?;
        self.layout.write_tables(&mut self.nc, &tables)?;

        let summary = WriteSummary {
            observations_written: rows,
            headers_written: self.headers.len(),
            raw_headers_written: self.headers.raw_header_count(),
            message_types: self.headers.types().len(),
            stations: self.headers.stations().len(),
            valid_times: self.headers.valid_times().len(),
            quality_flags: self.quality.len(),
            variables: variables.map_or(0, VariableTable::len),
            buffer_flushes: self.buffer.flushes(),
            bytes_written: 0,
        };

        let Self {
            nc,
            staging,
            destination,
            ..
        } = self;
        nc.close()?;
        staging
            .persist(&destination)
            .map_err(|e| PointObsError::io_at(&destination, e.error))?;
        let bytes_written = fs::metadata(&destination)
            .map_err(|e| PointObsError::io_at(&destination, e))?
            .len();
        info!(
            "Wrote {} observations and {} headers to {} ({})",
            summary.observations_written,
            summary.headers_written,
            destination.display(),
            WriteSummary::format_bytes(bytes_written)
        );

        Ok(WriteSummary {
            bytes_written,
            ..summary
        })
    }
}
