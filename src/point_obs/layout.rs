//! Variable definitions and column writes for the two on-disk layouts.
//!
//! V1.2 stores one integer or float column per field and dictionary tables
//! for repeated strings. V1.0 stores per-row strings and the combined
//! `hdr_arr` / `obs_arr` float arrays.
//!
//! Classic files separate definition from data, so the header tables are
//! declared in one pass ([`Layout::define_tables`]) and filled in another
//! ([`Layout::write_tables`]).

use super::buffer::ObservationBuffer;
use super::text::{NcChar, encode_rows};
use crate::config::WriterConfig;
use crate::constants::{
    FILL_VALUE, FILL_VALUE_INT, HDR_ARRAY_LEN, HEADER_STR_LEN, HEADER_STR_LEN2, HEADER_STR_LEN3,
    OBS_ARRAY_LEN, attrs, dims, vars,
};
use crate::dictionary::DictionaryTable;
use crate::error::{PointObsError, Result};
use crate::header::HeaderRegistry;
use crate::models::{FormatVersion, RawReport, SummaryAttributes, VariableIdMode, VariableTable};
use netcdf::types::NcTypeDescriptor;
use netcdf::{AttributeValue, FileMut, VariableMut};
use tracing::debug;

/// Everything written once the observation stream is complete
pub(crate) struct Tables<'a> {
    pub headers: &'a HeaderRegistry,
    pub quality: &'a DictionaryTable<String>,
    pub variables: Option<&'a VariableTable>,
    pub summary: Option<&'a SummaryAttributes>,
}

/// Layout of an open write session
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    version: FormatVersion,
    vid_name: &'static str,
}

impl Layout {
    /// Define the string dimensions, the observation record dimension and
    /// the observation columns, plus the version and encoding-mode attributes
    pub(crate) fn define(nc: &mut FileMut, config: &WriterConfig) -> Result<Self> {
        nc.add_attribute(attrs::OBS_VERSION, config.version.attribute_value())?;
        nc.add_attribute(
            attrs::USE_VAR_ID,
            if config.variable_id_mode.use_var_id() { "true" } else { "false" },
        )?;

        nc.add_dimension(dims::MXSTR, HEADER_STR_LEN)?;
        nc.add_dimension(dims::MXSTR2, HEADER_STR_LEN2)?;
        nc.add_dimension(dims::MXSTR3, HEADER_STR_LEN3)?;
        nc.add_unlimited_dimension(dims::NOBS)?;

        let vid_name = match config.variable_id_mode {
            VariableIdMode::VariableIndex => vars::OBS_VID,
            VariableIdMode::GribCode => vars::OBS_GC,
        };
        match config.version {
            FormatVersion::V1_2 => define_indexed_obs(nc, vid_name, config)?,
            FormatVersion::V1_0 => define_legacy_obs(nc)?,
        }

        Ok(Self {
            version: config.version,
            vid_name,
        })
    }

    pub(crate) fn version(&self) -> FormatVersion {
        self.version
    }

    /// Write the staged buffer as one hyperslab per column at the buffer offset
    pub(crate) fn write_observations(
        &self,
        nc: &mut FileMut,
        buffer: &ObservationBuffer,
        quality: &DictionaryTable<String>,
    ) -> Result<()> {
        let start = buffer.offset();
        match self.version {
            FormatVersion::V1_2 => {
                put_column(nc, vars::OBS_QTY, start, buffer.quality_indices())?;
                put_column(nc, vars::OBS_HID, start, buffer.header_indices())?;
                put_column(nc, self.vid_name, start, buffer.variable_ids())?;
                put_column(nc, vars::OBS_LVL, start, buffer.levels())?;
                put_column(nc, vars::OBS_HGT, start, buffer.heights())?;
                put_column(nc, vars::OBS_VAL, start, buffer.values())?;
            }
            FormatVersion::V1_0 => {
                let mut rows = Vec::with_capacity(buffer.len() * OBS_ARRAY_LEN);
                for i in 0..buffer.len() {
                    rows.extend_from_slice(&[
                        buffer.header_indices()[i] as f32,
                        buffer.variable_ids()[i] as f32,
                        buffer.levels()[i],
                        buffer.heights()[i],
                        buffer.values()[i],
                    ]);
                }
                let flags = buffer
                    .quality_indices()
                    .iter()
                    .map(|&q| quality.resolve(q as usize).map(String::as_str))
                    .collect::<Result<Vec<&str>>>()?;
                put_rows(nc, vars::OBS_ARR, start, OBS_ARRAY_LEN, &rows)?;
                put_text(nc, vars::OBS_QTY, start, HEADER_STR_LEN, &flags)?;
            }
        }
        Ok(())
    }

    /// Declare the header, dictionary, raw report and variable tables and
    /// record the summary attributes. The file must be in define mode.
    pub(crate) fn define_tables(&self, nc: &mut FileMut, tables: &Tables<'_>) -> Result<()> {
        let headers = tables.headers;
        nc.add_dimension(dims::NHDR, headers.len())?;
        match self.version {
            FormatVersion::V1_2 => {
                define_indexed_headers(nc)?;
                let typ = (dims::NHDR_TYP, vars::HDR_TYP_TABLE, dims::MXSTR2);
                define_table(nc, typ, headers.types().len())?
                    .put_attribute(attrs::LONG_NAME, "message type")?;
                let sid = (dims::NHDR_SID, vars::HDR_SID_TABLE, dims::MXSTR2);
                define_table(nc, sid, headers.stations().len())?
                    .put_attribute(attrs::LONG_NAME, "station identification")?;
                let vld = (dims::NHDR_VLD, vars::HDR_VLD_TABLE, dims::MXSTR);
                let mut vld = define_table(nc, vld, headers.valid_times().len())?;
                vld.put_attribute(attrs::LONG_NAME, "valid time")?;
                vld.put_attribute(attrs::UNITS, "YYYYMMDD_HHMMSS UTC")?;
                if !tables.quality.is_empty() {
                    let qty = (dims::NOBS_QTY, vars::OBS_QTY_TABLE, dims::MXSTR);
                    define_table(nc, qty, tables.quality.len())?
                        .put_attribute(attrs::LONG_NAME, "quality flag")?;
                }
            }
            FormatVersion::V1_0 => define_legacy_headers(nc)?,
        }

        if !headers.raw_reports().is_empty() {
            nc.add_dimension(dims::NPBHDR, headers.raw_reports().len())?;
            for (name, long_name) in [
                (vars::HDR_PRPT_TYP, "PB report type"),
                (vars::HDR_IRPT_TYP, "In report type"),
                (vars::HDR_INST_TYP, "instrument type"),
            ] {
                let mut var = nc.add_variable::<i32>(name, &[dims::NPBHDR])?;
                describe(&mut var, long_name, FILL_VALUE_INT)?;
            }
        }

        if let Some(table) = tables.variables.filter(|t| !t.is_empty()) {
            nc.add_dimension(dims::OBS_VAR_NUM, table.len())?;
            nc.add_variable::<NcChar>(vars::OBS_VAR, &[dims::OBS_VAR_NUM, dims::MXSTR2])?
                .put_attribute(attrs::LONG_NAME, "variable names")?;
            if table.has_metadata() {
                nc.add_variable::<NcChar>(vars::OBS_UNIT, &[dims::OBS_VAR_NUM, dims::MXSTR2])?
                    .put_attribute(attrs::LONG_NAME, "variable units")?;
                nc.add_variable::<NcChar>(vars::OBS_DESC, &[dims::OBS_VAR_NUM, dims::MXSTR3])?
                    .put_attribute(attrs::LONG_NAME, "variable descriptions")?;
            }
        }

        if let Some(summary) = tables.summary {
            write_summary_attributes(nc, summary)?;
        }
        Ok(())
    }

    /// Fill the tables declared by [`define_tables`](Self::define_tables).
    /// The file must be in data mode.
    pub(crate) fn write_tables(&self, nc: &mut FileMut, tables: &Tables<'_>) -> Result<()> {
        let headers = tables.headers;
        match self.version {
            FormatVersion::V1_2 => {
                let typ_idx = index_column(headers.type_indices(), "message type")?;
                let sid_idx = index_column(headers.station_indices(), "station")?;
                let vld_idx = index_column(headers.valid_time_indices(), "valid time")?;
                put_column(nc, vars::HDR_TYP, 0, &typ_idx)?;
                put_column(nc, vars::HDR_SID, 0, &sid_idx)?;
                put_column(nc, vars::HDR_VLD, 0, &vld_idx)?;
                put_column(nc, vars::HDR_LAT, 0, headers.latitudes())?;
                put_column(nc, vars::HDR_LON, 0, headers.longitudes())?;
                put_column(nc, vars::HDR_ELV, 0, headers.elevations())?;

                put_text(nc, vars::HDR_TYP_TABLE, 0, HEADER_STR_LEN2, headers.types().values())?;
                put_text(nc, vars::HDR_SID_TABLE, 0, HEADER_STR_LEN2, headers.stations().values())?;
                let times = headers.valid_times().values();
                put_text(nc, vars::HDR_VLD_TABLE, 0, HEADER_STR_LEN, times)?;
                put_text(nc, vars::OBS_QTY_TABLE, 0, HEADER_STR_LEN, tables.quality.values())?;
                debug!(
                    "Wrote {} header rows ({} types, {} stations, {} valid times)",
                    headers.len(),
                    headers.types().len(),
                    headers.stations().len(),
                    headers.valid_times().len()
                );
            }
            FormatVersion::V1_0 => write_legacy_headers(nc, headers)?,
        }

        let reports = headers.raw_reports();
        let column = |f: fn(&RawReport) -> i32| reports.iter().map(f).collect::<Vec<i32>>();
        put_column(nc, vars::HDR_PRPT_TYP, 0, &column(|r| r.pb_report_type))?;
        put_column(nc, vars::HDR_IRPT_TYP, 0, &column(|r| r.in_report_type))?;
        put_column(nc, vars::HDR_INST_TYP, 0, &column(|r| r.instrument_type))?;

        if let Some(table) = tables.variables.filter(|t| !t.is_empty()) {
            put_text(nc, vars::OBS_VAR, 0, HEADER_STR_LEN2, table.names())?;
            if table.has_metadata() {
                put_text(nc, vars::OBS_UNIT, 0, HEADER_STR_LEN2, table.units())?;
                put_text(nc, vars::OBS_DESC, 0, HEADER_STR_LEN3, table.descriptions())?;
            }
            debug!("Wrote variable table with {} entries", table.len());
        }
        Ok(())
    }
}

/// Global attributes recording an applied time summary
fn write_summary_attributes(nc: &mut FileMut, summary: &SummaryAttributes) -> Result<()> {
    let codes: Vec<String> = summary.grib_codes.iter().map(i32::to_string).collect();
    nc.add_attribute(attrs::TIME_SUMMARY_BEG, summary.begin.as_str())?;
    nc.add_attribute(attrs::TIME_SUMMARY_END, summary.end.as_str())?;
    nc.add_attribute(attrs::TIME_SUMMARY_STEP, summary.step)?;
    nc.add_attribute(attrs::TIME_SUMMARY_WIDTH, summary.width)?;
    nc.add_attribute(attrs::TIME_SUMMARY_GRIB_CODE, codes.join(","))?;
    nc.add_attribute(attrs::TIME_SUMMARY_OBS_VAR, summary.obs_vars.join(","))?;
    nc.add_attribute(attrs::TIME_SUMMARY_TYPE, summary.types.join(","))?;
    Ok(())
}

fn define_indexed_obs(nc: &mut FileMut, vid_name: &str, config: &WriterConfig) -> Result<()> {
    let obs = [dims::NOBS];
    nc.add_variable::<i32>(vars::OBS_QTY, &obs)?
        .put_attribute(attrs::LONG_NAME, "index of quality flag")?;
    describe(
        &mut nc.add_variable::<i32>(vars::OBS_HID, &obs)?,
        "index of matching header data",
        FILL_VALUE_INT,
    )?;
    describe(
        &mut nc.add_variable::<i32>(vid_name, &obs)?,
        variable_long_name(config),
        FILL_VALUE_INT,
    )?;
    describe(
        &mut nc.add_variable::<f32>(vars::OBS_LVL, &obs)?,
        "pressure level (hPa) or accumulation interval (sec)",
        FILL_VALUE,
    )?;
    describe(
        &mut nc.add_variable::<f32>(vars::OBS_HGT, &obs)?,
        height_long_name(config),
        FILL_VALUE,
    )?;
    describe(
        &mut nc.add_variable::<f32>(vars::OBS_VAL, &obs)?,
        "observation value",
        FILL_VALUE,
    )?;
    Ok(())
}

fn define_legacy_obs(nc: &mut FileMut) -> Result<()> {
    nc.add_dimension(dims::OBS_ARR_LEN, OBS_ARRAY_LEN)?;
    nc.add_variable::<NcChar>(vars::OBS_QTY, &[dims::NOBS, dims::MXSTR])?
        .put_attribute(attrs::LONG_NAME, "quality flag")?;

    let mut arr = nc.add_variable::<f32>(vars::OBS_ARR, &[dims::NOBS, dims::OBS_ARR_LEN])?;
    describe(&mut arr, "array of observation values", FILL_VALUE)?;
    for (name, value) in [
        (attrs::COLUMNS, "hdr_id gc lvl hgt ob"),
        ("hdr_id_long_name", "index of matching header data"),
        ("gc_long_name", "grib code corresponding to the observation type"),
        ("lvl_long_name", "pressure level (hPa) or accumulation interval (sec)"),
        (
            "hgt_long_name",
            "height in meters above sea level or ground level (msl or agl)",
        ),
        ("ob_long_name", "observation value"),
    ] {
        arr.put_attribute(name, value)?;
    }
    Ok(())
}

fn define_indexed_headers(nc: &mut FileMut) -> Result<()> {
    let nhdr = [dims::NHDR];
    for (name, long_name) in [
        (vars::HDR_TYP, "index of message type"),
        (vars::HDR_SID, "index of station identification"),
        (vars::HDR_VLD, "index of valid time"),
    ] {
        describe(&mut nc.add_variable::<i32>(name, &nhdr)?, long_name, FILL_VALUE_INT)?;
    }
    for (name, long_name, units) in [
        (vars::HDR_LAT, "latitude", "degrees_north"),
        (vars::HDR_LON, "longitude", "degrees_east"),
        (vars::HDR_ELV, "elevation", "meters above sea level (msl)"),
    ] {
        let mut var = nc.add_variable::<f32>(name, &nhdr)?;
        describe(&mut var, long_name, FILL_VALUE)?;
        var.put_attribute(attrs::UNITS, units)?;
    }
    Ok(())
}

fn define_legacy_headers(nc: &mut FileMut) -> Result<()> {
    nc.add_dimension(dims::HDR_ARR_LEN, HDR_ARRAY_LEN)?;
    nc.add_variable::<NcChar>(vars::HDR_TYP, &[dims::NHDR, dims::MXSTR2])?
        .put_attribute(attrs::LONG_NAME, "message type")?;
    nc.add_variable::<NcChar>(vars::HDR_SID, &[dims::NHDR, dims::MXSTR2])?
        .put_attribute(attrs::LONG_NAME, "station identification")?;
    let mut vld = nc.add_variable::<NcChar>(vars::HDR_VLD, &[dims::NHDR, dims::MXSTR])?;
    vld.put_attribute(attrs::LONG_NAME, "valid time")?;
    vld.put_attribute(attrs::UNITS, "YYYYMMDD_HHMMSS UTC")?;

    let mut arr = nc.add_variable::<f32>(vars::HDR_ARR, &[dims::NHDR, dims::HDR_ARR_LEN])?;
    describe(&mut arr, "array of observation station header values", FILL_VALUE)?;
    for (name, value) in [
        (attrs::COLUMNS, "lat lon elv"),
        ("lat_long_name", "latitude"),
        ("lat_units", "degrees_north"),
        ("lon_long_name", "longitude"),
        ("lon_units", "degrees_east"),
        ("elv_long_name", "elevation"),
        ("elv_units", "meters above sea level (msl)"),
    ] {
        arr.put_attribute(name, value)?;
    }
    Ok(())
}

fn write_legacy_headers(nc: &mut FileMut, headers: &HeaderRegistry) -> Result<()> {
    let mut types = Vec::with_capacity(headers.len());
    let mut stations = Vec::with_capacity(headers.len());
    let mut times = Vec::with_capacity(headers.len());
    let mut locations = Vec::with_capacity(headers.len() * HDR_ARRAY_LEN);
    for i in 0..headers.len() {
        let header = headers.header(i)?;
        types.push(header.message_type);
        stations.push(header.station_id);
        times.push(headers.valid_times().resolve(headers.valid_time_indices()[i])?.as_str());
        locations.extend_from_slice(&[header.latitude, header.longitude, header.elevation]);
    }
    put_text(nc, vars::HDR_TYP, 0, HEADER_STR_LEN2, &types)?;
    put_text(nc, vars::HDR_SID, 0, HEADER_STR_LEN2, &stations)?;
    put_text(nc, vars::HDR_VLD, 0, HEADER_STR_LEN, &times)?;
    put_rows(nc, vars::HDR_ARR, 0, HDR_ARRAY_LEN, &locations)?;
    debug!("Wrote {} legacy header rows", headers.len());
    Ok(())
}

/// A char table with its own row dimension: `(row dim, variable, width dim)`
fn define_table<'f>(
    nc: &'f mut FileMut,
    (dim_name, var_name, width): (&str, &str, &str),
    rows: usize,
) -> Result<VariableMut<'f>> {
    nc.add_dimension(dim_name, rows)?;
    Ok(nc.add_variable::<NcChar>(var_name, &[dim_name, width])?)
}

fn describe<T>(var: &mut VariableMut<'_>, long_name: &str, fill: T) -> Result<()>
where
    T: Into<AttributeValue>,
{
    var.put_attribute(attrs::LONG_NAME, long_name)?;
    var.put_attribute(attrs::FILL_VALUE, fill)?;
    Ok(())
}

fn variable_mut<'f>(nc: &'f mut FileMut, name: &str) -> Result<VariableMut<'f>> {
    nc.variable_mut(name)
        .ok_or_else(|| PointObsError::MissingVariable {
            name: name.to_string(),
        })
}

/// Write `values` into a one-dimensional variable starting at row `start`
fn put_column<T: NcTypeDescriptor>(
    nc: &mut FileMut,
    name: &str,
    start: usize,
    values: &[T],
) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    variable_mut(nc, name)?.put_values(values, start..start + values.len())?;
    Ok(())
}

/// Write `width`-wide rows into a two-dimensional variable starting at row `start`
fn put_rows<T: NcTypeDescriptor>(
    nc: &mut FileMut,
    name: &str,
    start: usize,
    width: usize,
    values: &[T],
) -> Result<()> {
    let rows = values.len() / width;
    if rows == 0 {
        return Ok(());
    }
    variable_mut(nc, name)?.put_values(values, (start..start + rows, ..))?;
    Ok(())
}

fn put_text<S: AsRef<str>>(
    nc: &mut FileMut,
    name: &str,
    start: usize,
    width: usize,
    values: &[S],
) -> Result<()> {
    put_rows(nc, name, start, width, &encode_rows(values, width, name))
}

fn variable_long_name(config: &WriterConfig) -> &'static str {
    match (config.variable_id_mode, config.prepbufr_names) {
        (VariableIdMode::GribCode, _) => "grib code corresponding to the observation type",
        (VariableIdMode::VariableIndex, true) => {
            "index of BUFR variable corresponding to the observation type"
        }
        (VariableIdMode::VariableIndex, false) => "index of variable names at var_name",
    }
}

fn height_long_name(config: &WriterConfig) -> &'static str {
    if config.height_above_ground {
        "height in meters above sea level or ground level (msl or agl)"
    } else {
        "height in meters above sea level (msl)"
    }
}

fn index_column(indices: &[usize], what: &str) -> Result<Vec<i32>> {
    indices
        .iter()
        .map(|&i| {
            i32::try_from(i).map_err(|_| {
                PointObsError::out_of_range(format!("{what} table"), i, i32::MAX as usize)
            })
        })
        .collect()
}
