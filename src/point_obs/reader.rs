//! Point observation reader
//!
//! The layout is detected once at open and the required structure checked
//! up front. Header rows and dictionary tables are loaded on first use;
//! observation rows are decoded in bounded chunks.

use super::text::{NcChar, decode_rows};
use crate::config::ReaderConfig;
use crate::constants::{HDR_ARRAY_LEN, OBS_ARRAY_LEN, attrs, dims, vars};
use crate::dictionary::DictionaryTable;
use crate::error::{PointObsError, Result};
use crate::header::HeaderRegistry;
use crate::models::{
    FormatVersion, Observation, RawReport, SummaryAttributes, VariableIdMode, VariableTable,
};
use netcdf::types::NcTypeDescriptor;
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Layout of an open file: `hdr_lat` means V1.2, `hdr_arr` means V1.0
pub fn layout_version(nc: &File) -> Result<FormatVersion> {
    if has_variable(nc, vars::HDR_LAT) {
        Ok(FormatVersion::V1_2)
    } else if has_variable(nc, vars::HDR_ARR) {
        Ok(FormatVersion::V1_0)
    } else {
        Err(PointObsError::MissingVariable {
            name: vars::HDR_LAT.to_string(),
        })
    }
}

/// Raw observation columns of one chunk, before resolution
struct ObsChunk {
    header_index: Vec<i32>,
    variable_id: Vec<i32>,
    level: Vec<f32>,
    height: Vec<f32>,
    value: Vec<f32>,
    quality: QualityColumn,
}

enum QualityColumn {
    Indices(Vec<i32>),
    Text(Vec<String>),
}

/// Read session for one point observation file
#[derive(Debug)]
pub struct PointObsReader {
    nc: File,
    path: PathBuf,
    config: ReaderConfig,
    version: FormatVersion,
    variable_id_mode: VariableIdMode,
    obs_count: usize,
    hdr_count: usize,
    headers: Option<HeaderRegistry>,
    quality: Option<Vec<String>>,
    variables: Option<Option<VariableTable>>,
}

impl PointObsReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        config.validate().map_err(PointObsError::configuration)?;
        let path = path.as_ref().to_path_buf();
        let nc = netcdf::open(&path).map_err(|e| PointObsError::netcdf_at(&path, e))?;
        let version = layout_version(&nc)?;

        let use_var_id = match attribute_value(&nc, attrs::USE_VAR_ID)? {
            Some(AttributeValue::Str(text)) => text.trim().eq_ignore_ascii_case("true"),
            _ => has_variable(&nc, vars::OBS_VID),
        };
        let variable_id_mode = VariableIdMode::from_use_var_id(use_var_id);

        let obs_count = required_dimension(&nc, dims::NOBS)?;
        let hdr_count = required_dimension(&nc, dims::NHDR)?;
        check_structure(&nc, version, variable_id_mode, obs_count)?;

        debug!(
            "Opened {} point observation file {}: {} headers, {} observations",
            version,
            path.display(),
            hdr_count,
            obs_count
        );

        Ok(Self {
            nc,
            path,
            config,
            version,
            variable_id_mode,
            obs_count,
            hdr_count,
            headers: None,
            quality: None,
            variables: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn variable_id_mode(&self) -> VariableIdMode {
        self.variable_id_mode
    }

    pub fn use_var_id(&self) -> bool {
        self.variable_id_mode.use_var_id()
    }

    pub fn obs_count(&self) -> usize {
        self.obs_count
    }

    pub fn hdr_count(&self) -> usize {
        self.hdr_count
    }

    /// Underlying container, for diagnostics
    pub fn container(&self) -> &File {
        &self.nc
    }

    /// Header rows in the same registry shape the writer builds, whatever
    /// the layout
    pub fn read_headers(&mut self) -> Result<&HeaderRegistry> {
        self.load_headers()?;
        self.headers
            .as_ref()
            .ok_or_else(|| PointObsError::state("header rows failed to load"))
    }

    fn load_headers(&mut self) -> Result<()> {
        if self.headers.is_some() {
            return Ok(());
        }
        let registry = match self.version {
            FormatVersion::V1_2 => self.read_indexed_headers()?,
            FormatVersion::V1_0 => self.read_legacy_headers()?,
        };
        self.headers = Some(registry);
        Ok(())
    }

    fn read_indexed_headers(&self) -> Result<HeaderRegistry> {
        let n = self.hdr_count;
        let nc = &self.nc;

        let types = read_table(nc, vars::HDR_TYP_TABLE)?;
        let stations = read_table(nc, vars::HDR_SID_TABLE)?;
        let valid_times = read_table(nc, vars::HDR_VLD_TABLE)?;

        let typ_idx = to_indices(read_column(nc, vars::HDR_TYP, 0, n)?, vars::HDR_TYP)?;
        let sid_idx = to_indices(read_column(nc, vars::HDR_SID, 0, n)?, vars::HDR_SID)?;
        let vld_idx = to_indices(read_column(nc, vars::HDR_VLD, 0, n)?, vars::HDR_VLD)?;
        let lat = read_column(nc, vars::HDR_LAT, 0, n)?;
        let lon = read_column(nc, vars::HDR_LON, 0, n)?;
        let elv = read_column(nc, vars::HDR_ELV, 0, n)?;
        let raw_reports = read_raw_reports(nc)?;

        HeaderRegistry::from_columns(
            types,
            stations,
            valid_times,
            typ_idx,
            sid_idx,
            vld_idx,
            lat,
            lon,
            elv,
            raw_reports,
        )
    }

    fn read_legacy_headers(&self) -> Result<HeaderRegistry> {
        let n = self.hdr_count;
        let nc = &self.nc;

        let type_rows = read_text(nc, vars::HDR_TYP, 0, n)?;
        let station_rows = read_text(nc, vars::HDR_SID, 0, n)?;
        let time_rows = read_text(nc, vars::HDR_VLD, 0, n)?;
        let locations = read_rows::<f32>(nc, vars::HDR_ARR, 0, n, HDR_ARRAY_LEN)?;

        let mut types = DictionaryTable::<String>::new("message type table");
        let mut stations = DictionaryTable::<String>::new("station table");
        let mut times = DictionaryTable::<String>::new("valid time table");
        let typ_idx = type_rows.iter().map(|t| types.intern(t.as_str())).collect();
        let sid_idx = station_rows.iter().map(|s| stations.intern(s.as_str())).collect();
        let vld_idx = time_rows.iter().map(|t| times.intern(t.as_str())).collect();

        let mut lat = Vec::with_capacity(n);
        let mut lon = Vec::with_capacity(n);
        let mut elv = Vec::with_capacity(n);
        for row in locations.chunks_exact(HDR_ARRAY_LEN) {
            lat.push(row[0]);
            lon.push(row[1]);
            elv.push(row[2]);
        }

        HeaderRegistry::from_columns(
            types.values().to_vec(),
            stations.values().to_vec(),
            times.values().to_vec(),
            typ_idx,
            sid_idx,
            vld_idx,
            lat,
            lon,
            elv,
            read_raw_reports(nc)?,
        )
    }

    /// Distinct quality flags. V1.2 reads `obs_qty_table`; V1.0 collects
    /// the per-row flags in first-seen order.
    pub fn quality_table(&mut self) -> Result<&[String]> {
        self.load_quality()?;
        Ok(self.quality.as_deref().unwrap_or_default())
    }

    fn load_quality(&mut self) -> Result<()> {
        if self.quality.is_some() {
            return Ok(());
        }
        let table = match self.version {
            FormatVersion::V1_2 if has_variable(&self.nc, vars::OBS_QTY_TABLE) => {
                read_table(&self.nc, vars::OBS_QTY_TABLE)?
            }
            FormatVersion::V1_2 => Vec::new(),
            FormatVersion::V1_0 => {
                let mut flags = DictionaryTable::<String>::new("quality flag table");
                let mut start = 0;
                while start < self.obs_count {
                    let n = self.config.chunk_size.min(self.obs_count - start);
                    for flag in read_text(&self.nc, vars::OBS_QTY, start, n)? {
                        flags.intern(flag.as_str());
                    }
                    start += n;
                }
                flags.values().to_vec()
            }
        };
        self.quality = Some(table);
        Ok(())
    }

    /// Variable names, units and descriptions, if the file carries them
    pub fn variable_table(&mut self) -> Result<Option<&VariableTable>> {
        self.load_variables()?;
        Ok(self.variables.as_ref().and_then(Option::as_ref))
    }

    fn load_variables(&mut self) -> Result<()> {
        if self.variables.is_some() {
            return Ok(());
        }
        if !has_variable(&self.nc, vars::OBS_VAR) {
            self.variables = Some(None);
            return Ok(());
        }

        let names = read_table(&self.nc, vars::OBS_VAR)?;
        let units = read_optional_column(&self.nc, vars::OBS_UNIT, names.len())?;
        let descriptions = read_optional_column(&self.nc, vars::OBS_DESC, names.len())?;

        let mut table = VariableTable::new();
        for (i, name) in names.iter().enumerate() {
            table.add(name, &units[i], &descriptions[i]);
        }
        debug!("Loaded variable table with {} entries", table.len());
        self.variables = Some(Some(table));
        Ok(())
    }

    /// PrepBufr triplet of header row `index`, if the file records one
    pub fn raw_report(&mut self, index: usize) -> Result<Option<RawReport>> {
        if index >= self.hdr_count {
            return Err(PointObsError::out_of_range("header", index, self.hdr_count));
        }
        Ok(self.read_headers()?.raw_report(index))
    }

    /// Time summary attributes, when the file records an applied summary
    pub fn summary_attributes(&self) -> Result<Option<SummaryAttributes>> {
        if self.nc.attribute(attrs::TIME_SUMMARY_TYPE).is_none() {
            return Ok(None);
        }
        let text = |name: &str| -> Result<String> {
            match attribute_value(&self.nc, name)? {
                Some(AttributeValue::Str(text)) => Ok(text),
                _ => Err(PointObsError::format(format!(
                    "attribute {name} is missing or not text"
                ))),
            }
        };
        let number = |name: &str| -> Result<i32> {
            attribute_value(&self.nc, name)?
                .and_then(|value| i32::try_from(value).ok())
                .ok_or_else(|| {
                    PointObsError::format(format!("attribute {name} is missing or not an integer"))
                })
        };

        let grib_codes = split_list(&text(attrs::TIME_SUMMARY_GRIB_CODE)?)
            .into_iter()
            .map(|code| {
                code.parse::<i32>().map_err(|_| {
                    PointObsError::format(format!(
                        "invalid grib code '{code}' in summary attributes"
                    ))
                })
            })
            .collect::<Result<Vec<i32>>>()?;

        Ok(Some(SummaryAttributes {
            begin: text(attrs::TIME_SUMMARY_BEG)?,
            end: text(attrs::TIME_SUMMARY_END)?,
            step: number(attrs::TIME_SUMMARY_STEP)?,
            width: number(attrs::TIME_SUMMARY_WIDTH)?,
            grib_codes,
            obs_vars: split_list(&text(attrs::TIME_SUMMARY_OBS_VAR)?),
            types: split_list(&text(attrs::TIME_SUMMARY_TYPE)?),
        }))
    }

    /// Decode `count` observations starting at row `offset`, resolving
    /// header fields, quality flags and variable names
    pub fn read_observations(&mut self, offset: usize, count: usize) -> Result<Vec<Observation>> {
        let end = offset.saturating_add(count);
        if end > self.obs_count {
            return Err(PointObsError::out_of_range(
                "observation",
                end.saturating_sub(1),
                self.obs_count,
            ));
        }
        self.load_headers()?;
        if self.version == FormatVersion::V1_2 {
            self.load_quality()?;
        }
        if self.use_var_id() {
            self.load_variables()?;
        }

        let mut observations = Vec::with_capacity(count);
        let mut start = offset;
        while start < end {
            let n = self.config.chunk_size.min(end - start);
            let chunk = self.read_chunk(start, n)?;
            self.resolve_chunk(chunk, &mut observations)?;
            start += n;
        }
        Ok(observations)
    }

    /// Iterate over every observation, decoding one chunk at a time
    pub fn observations(&mut self) -> ObservationIter<'_> {
        ObservationIter {
            reader: self,
            next: 0,
            pending: Vec::new().into_iter(),
        }
    }

    fn read_chunk(&self, start: usize, n: usize) -> Result<ObsChunk> {
        let nc = &self.nc;
        match self.version {
            FormatVersion::V1_2 => {
                let vid_name = match self.variable_id_mode {
                    VariableIdMode::VariableIndex => vars::OBS_VID,
                    VariableIdMode::GribCode => vars::OBS_GC,
                };
                Ok(ObsChunk {
                    header_index: read_column(nc, vars::OBS_HID, start, n)?,
                    variable_id: read_column(nc, vid_name, start, n)?,
                    level: read_column(nc, vars::OBS_LVL, start, n)?,
                    height: read_column(nc, vars::OBS_HGT, start, n)?,
                    value: read_column(nc, vars::OBS_VAL, start, n)?,
                    quality: QualityColumn::Indices(read_column(nc, vars::OBS_QTY, start, n)?),
                })
            }
            FormatVersion::V1_0 => {
                let arr = read_rows::<f32>(nc, vars::OBS_ARR, start, n, OBS_ARRAY_LEN)?;
                let mut chunk = ObsChunk {
                    header_index: Vec::with_capacity(n),
                    variable_id: Vec::with_capacity(n),
                    level: Vec::with_capacity(n),
                    height: Vec::with_capacity(n),
                    value: Vec::with_capacity(n),
                    quality: QualityColumn::Text(read_text(nc, vars::OBS_QTY, start, n)?),
                };
                for row in arr.chunks_exact(OBS_ARRAY_LEN) {
                    chunk.header_index.push(row[0] as i32);
                    chunk.variable_id.push(row[1] as i32);
                    chunk.level.push(row[2]);
                    chunk.height.push(row[3]);
                    chunk.value.push(row[4]);
                }
                Ok(chunk)
            }
        }
    }

    fn resolve_chunk(&self, chunk: ObsChunk, out: &mut Vec<Observation>) -> Result<()> {
        let headers = self
            .headers
            .as_ref()
            .ok_or_else(|| PointObsError::state("header rows not loaded"))?;
        let quality = self.quality.as_deref().unwrap_or_default();
        let variables = self.variables.as_ref().and_then(Option::as_ref);

        for i in 0..chunk.header_index.len() {
            let hid = to_index(chunk.header_index[i], vars::OBS_HID)?;
            let header = headers.header(hid)?;

            let quality_flag = match &chunk.quality {
                QualityColumn::Indices(indices) => {
                    let q = to_index(indices[i], vars::OBS_QTY)?;
                    quality.get(q).cloned().ok_or_else(|| {
                        PointObsError::out_of_range("quality flag table", q, quality.len())
                    })?
                }
                QualityColumn::Text(flags) => flags[i].clone(),
            };

            let var_code = chunk.variable_id[i];
            let var_name = match (self.variable_id_mode, variables) {
                (VariableIdMode::VariableIndex, Some(table)) => {
                    table.name(to_index(var_code, vars::OBS_VID)?)?.to_string()
                }
                _ => String::new(),
            };

            out.push(Observation {
                header_type: header.message_type.to_string(),
                station_id: header.station_id.to_string(),
                valid_time: header.valid_time,
                latitude: header.latitude,
                longitude: header.longitude,
                elevation: header.elevation,
                quality_flag,
                var_code,
                pressure_level: chunk.level[i],
                height: chunk.height[i],
                value: chunk.value[i],
                var_name,
                header_index: hid,
            });
        }
        Ok(())
    }
}

/// Chunked iterator returned by [`PointObsReader::observations`]
pub struct ObservationIter<'a> {
    reader: &'a mut PointObsReader,
    next: usize,
    pending: std::vec::IntoIter<Observation>,
}

impl Iterator for ObservationIter<'_> {
    type Item = Result<Observation>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(obs) = self.pending.next() {
            return Some(Ok(obs));
        }
        let total = self.reader.obs_count;
        if self.next >= total {
            return None;
        }
        let n = self.reader.config.chunk_size.min(total - self.next);
        match self.reader.read_observations(self.next, n) {
            Ok(chunk) => {
                self.next += n;
                self.pending = chunk.into_iter();
                self.pending.next().map(Ok)
            }
            Err(e) => {
                self.next = total;
                Some(Err(e))
            }
        }
    }
}

fn has_variable(nc: &File, name: &str) -> bool {
    nc.variable(name).is_some()
}

fn variable<'f>(nc: &'f File, name: &str) -> Result<Variable<'f>> {
    nc.variable(name)
        .ok_or_else(|| PointObsError::MissingVariable {
            name: name.to_string(),
        })
}

fn attribute_value(nc: &File, name: &str) -> Result<Option<AttributeValue>> {
    Ok(nc.attribute(name).map(|a| a.value()).transpose()?)
}

fn required_dimension(nc: &File, name: &str) -> Result<usize> {
    nc.dimension_len(name)
        .ok_or_else(|| PointObsError::MissingDimension {
            name: name.to_string(),
        })
}

/// Fail on the first missing dimension or variable the layout requires
fn check_structure(
    nc: &File,
    version: FormatVersion,
    mode: VariableIdMode,
    obs_count: usize,
) -> Result<()> {
    let vid_name = match mode {
        VariableIdMode::VariableIndex => vars::OBS_VID,
        VariableIdMode::GribCode => vars::OBS_GC,
    };
    let (required_dims, mut required_vars): (Vec<&str>, Vec<&str>) = match version {
        FormatVersion::V1_2 => {
            let mut needed_dims = vec![
                dims::MXSTR,
                dims::MXSTR2,
                dims::NHDR_TYP,
                dims::NHDR_SID,
                dims::NHDR_VLD,
            ];
            let mut needed_vars = vec![
                vars::HDR_TYP,
                vars::HDR_SID,
                vars::HDR_VLD,
                vars::HDR_LAT,
                vars::HDR_LON,
                vars::HDR_ELV,
                vars::HDR_TYP_TABLE,
                vars::HDR_SID_TABLE,
                vars::HDR_VLD_TABLE,
                vars::OBS_QTY,
                vars::OBS_HID,
                vid_name,
                vars::OBS_LVL,
                vars::OBS_HGT,
                vars::OBS_VAL,
            ];
            if obs_count > 0 {
                needed_dims.push(dims::NOBS_QTY);
                needed_vars.push(vars::OBS_QTY_TABLE);
            }
            (needed_dims, needed_vars)
        }
        FormatVersion::V1_0 => (
            vec![dims::MXSTR, dims::HDR_ARR_LEN, dims::OBS_ARR_LEN],
            vec![
                vars::HDR_TYP,
                vars::HDR_SID,
                vars::HDR_VLD,
                vars::HDR_ARR,
                vars::OBS_QTY,
                vars::OBS_ARR,
            ],
        ),
    };
    // Variable indices mean nothing without the names they point at
    if mode == VariableIdMode::VariableIndex {
        required_vars.push(vars::OBS_VAR);
    }

    if let Some(name) = required_dims.into_iter().find(|d| nc.dimension(d).is_none()) {
        return Err(PointObsError::MissingDimension {
            name: name.to_string(),
        });
    }
    if let Some(name) = required_vars.into_iter().find(|v| !has_variable(nc, v)) {
        return Err(PointObsError::MissingVariable {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// `n` values of a one-dimensional variable from row `start`
fn read_column<T>(nc: &File, name: &str, start: usize, n: usize) -> Result<Vec<T>>
where
    T: NcTypeDescriptor + Copy,
{
    if n == 0 {
        return Ok(Vec::new());
    }
    Ok(variable(nc, name)?.get_values::<T, _>(start..start + n)?)
}

/// `n` rows of a two-dimensional variable whose rows hold `width` values
fn read_rows<T>(nc: &File, name: &str, start: usize, n: usize, width: usize) -> Result<Vec<T>>
where
    T: NcTypeDescriptor + Copy,
{
    let var = variable(nc, name)?;
    let actual = row_width(&var)?;
    if actual != width {
        return Err(PointObsError::format(format!(
            "{name} rows must hold {width} values, found {actual}"
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    Ok(var.get_values::<T, _>((start..start + n, ..))?)
}

fn row_width(var: &Variable<'_>) -> Result<usize> {
    match var.dimensions() {
        [_, width] => Ok(width.len()),
        dims => Err(PointObsError::format(format!(
            "{} has {} dimensions, expected 2",
            var.name(),
            dims.len()
        ))),
    }
}

/// `n` strings of a `[rows, width]` char variable from row `start`
fn read_text(nc: &File, name: &str, start: usize, n: usize) -> Result<Vec<String>> {
    let var = variable(nc, name)?;
    let width = row_width(&var)?;
    if n == 0 {
        return Ok(Vec::new());
    }
    let chars = var.get_values::<NcChar, _>((start..start + n, ..))?;
    decode_rows(&chars, width, name)
}

fn rows(nc: &File, name: &str) -> Result<usize> {
    variable(nc, name)?
        .dimensions()
        .first()
        .map(|dim| dim.len())
        .ok_or_else(|| PointObsError::format(format!("{name} has no dimensions")))
}

fn read_table(nc: &File, name: &str) -> Result<Vec<String>> {
    read_text(nc, name, 0, rows(nc, name)?)
}

fn read_optional_column(nc: &File, name: &str, rows: usize) -> Result<Vec<String>> {
    if !has_variable(nc, name) {
        return Ok(vec![String::new(); rows]);
    }
    read_text(nc, name, 0, rows)
}

fn read_raw_reports(nc: &File) -> Result<Vec<RawReport>> {
    if !has_variable(nc, vars::HDR_PRPT_TYP) {
        return Ok(Vec::new());
    }
    let n = rows(nc, vars::HDR_PRPT_TYP)?;
    let prpt: Vec<i32> = read_column(nc, vars::HDR_PRPT_TYP, 0, n)?;
    let irpt: Vec<i32> = read_column(nc, vars::HDR_IRPT_TYP, 0, n)?;
    let inst: Vec<i32> = read_column(nc, vars::HDR_INST_TYP, 0, n)?;
    Ok(prpt
        .into_iter()
        .zip(irpt)
        .zip(inst)
        .map(|((pb_report_type, in_report_type), instrument_type)| RawReport {
            pb_report_type,
            in_report_type,
            instrument_type,
        })
        .collect())
}

fn to_index(value: i32, column: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| PointObsError::format(format!("negative index {value} in {column}")))
}

fn to_indices(values: Vec<i32>, column: &str) -> Result<Vec<usize>> {
    values.into_iter().map(|v| to_index(v, column)).collect()
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
