//! Names, widths and defaults of the point observation layouts
//!
//! This module contains every dimension, variable and attribute name used
//! on disk, together with the fixed string widths and buffer defaults.

// =============================================================================
// Buffering
// =============================================================================

/// Observation rows staged in memory before a flush
pub const DEFAULT_OBS_BUFFER_SIZE: usize = 32_768;

/// Observation rows decoded per read chunk
pub const DEFAULT_READ_CHUNK_SIZE: usize = DEFAULT_OBS_BUFFER_SIZE;

// =============================================================================
// String widths
// =============================================================================

/// Short strings: valid times, quality flags
pub const HEADER_STR_LEN: usize = 16;

/// Long strings: message types, station ids, variable names and units
pub const HEADER_STR_LEN2: usize = 40;

/// Variable descriptions
pub const HEADER_STR_LEN3: usize = 80;

/// Columns of the legacy combined header array (lat, lon, elv)
pub const HDR_ARRAY_LEN: usize = 3;

/// Columns of the legacy combined observation array (hdr_id, gc, lvl, hgt, ob)
pub const OBS_ARRAY_LEN: usize = 5;

// =============================================================================
// Values
// =============================================================================

/// Missing-data marker written as `_FillValue`
pub const FILL_VALUE: f32 = -9999.0;

/// Integer form of [`FILL_VALUE`]
pub const FILL_VALUE_INT: i32 = -9999;

/// Quality flag recorded when an observation carries none
pub const NA_QUALITY: &str = "NA";

/// Valid time string layout
pub const VALID_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

// =============================================================================
// Dimensions
// =============================================================================

pub mod dims {
    pub const NOBS: &str = "nobs";
    pub const NHDR: &str = "nhdr";
    pub const NHDR_TYP: &str = "nhdr_typ";
    pub const NHDR_SID: &str = "nhdr_sid";
    pub const NHDR_VLD: &str = "nhdr_vld";
    pub const NPBHDR: &str = "npbhdr";
    pub const NOBS_QTY: &str = "nobs_qty";
    pub const MXSTR: &str = "mxstr";
    pub const MXSTR2: &str = "mxstr2";
    pub const MXSTR3: &str = "mxstr3";
    pub const OBS_VAR_NUM: &str = "obs_var_num";
    pub const HDR_ARR_LEN: &str = "hdr_arr_len";
    pub const OBS_ARR_LEN: &str = "obs_arr_len";
}

// =============================================================================
// Variables
// =============================================================================

pub mod vars {
    // Header rows
    pub const HDR_TYP: &str = "hdr_typ";
    pub const HDR_SID: &str = "hdr_sid";
    pub const HDR_VLD: &str = "hdr_vld";
    pub const HDR_LAT: &str = "hdr_lat";
    pub const HDR_LON: &str = "hdr_lon";
    pub const HDR_ELV: &str = "hdr_elv";
    pub const HDR_ARR: &str = "hdr_arr";

    // PrepBufr raw report extension
    pub const HDR_PRPT_TYP: &str = "hdr_prpt_typ";
    pub const HDR_IRPT_TYP: &str = "hdr_irpt_typ";
    pub const HDR_INST_TYP: &str = "hdr_inst_typ";

    // Dictionary tables
    pub const HDR_TYP_TABLE: &str = "hdr_typ_table";
    pub const HDR_SID_TABLE: &str = "hdr_sid_table";
    pub const HDR_VLD_TABLE: &str = "hdr_vld_table";
    pub const OBS_QTY_TABLE: &str = "obs_qty_table";

    // Observation rows
    pub const OBS_QTY: &str = "obs_qty";
    pub const OBS_HID: &str = "obs_hid";
    pub const OBS_VID: &str = "obs_vid";
    pub const OBS_GC: &str = "obs_gc";
    pub const OBS_LVL: &str = "obs_lvl";
    pub const OBS_HGT: &str = "obs_hgt";
    pub const OBS_VAL: &str = "obs_val";
    pub const OBS_ARR: &str = "obs_arr";

    // Variable-index mode tables
    pub const OBS_VAR: &str = "obs_var";
    pub const OBS_UNIT: &str = "obs_unit";
    pub const OBS_DESC: &str = "obs_desc";
}

// =============================================================================
// Attributes
// =============================================================================

pub mod attrs {
    pub const OBS_VERSION: &str = "MET_Obs_version";
    pub const USE_VAR_ID: &str = "use_var_id";

    pub const LONG_NAME: &str = "long_name";
    pub const UNITS: &str = "units";
    pub const FILL_VALUE: &str = "_FillValue";
    pub const COLUMNS: &str = "columns";

    pub const TIME_SUMMARY_BEG: &str = "time_summary_beg";
    pub const TIME_SUMMARY_END: &str = "time_summary_end";
    pub const TIME_SUMMARY_STEP: &str = "time_summary_step";
    pub const TIME_SUMMARY_WIDTH: &str = "time_summary_width";
    pub const TIME_SUMMARY_GRIB_CODE: &str = "time_summary_grib_code";
    pub const TIME_SUMMARY_OBS_VAR: &str = "time_summary_obs_var";
    pub const TIME_SUMMARY_TYPE: &str = "time_summary_type";
}

/// Version attribute value of the dictionary-encoded layout
pub const OBS_VERSION_V1_2: &str = "1.02";

/// Version attribute value of the legacy array layout
pub const OBS_VERSION_V1_0: &str = "1.00";
