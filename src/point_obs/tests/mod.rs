//! Write/read tests for point observation files
//!
//! Each test writes into its own temporary directory and reads the result
//! back through `PointObsReader`.

pub mod writer_tests;

use crate::config::WriterConfig;
use crate::models::{Observation, WriteSummary, count_headers};
use crate::point_obs::{PointObsReader, PointObsWriter};
use std::path::Path;

/// 2021-01-01T00:00:00Z
pub const T0: i64 = 1_609_459_200;

/// A KDEN report at `level` hPa
fn kden(header_type: &str, valid_time: i64, quality: &str, level: f32, height: f32) -> Observation {
    Observation::new(
        header_type,
        "KDEN",
        valid_time,
        39.8,
        -104.7,
        1650.0,
        quality,
        11,
        level,
        height,
        0.0,
        "TMP",
    )
}

fn with_value(mut obs: Observation, value: f32) -> Observation {
    obs.value = value;
    obs
}

/// Surface and upper-air reports from two stations, header indices assigned
pub fn sample_observations() -> Vec<Observation> {
    let mut dew_point = with_value(kden("ADPSFC", T0, "1", 1000.0, 2.0), -9.5);
    dew_point.var_code = 17;
    dew_point.var_name = "DPT".to_string();
    let boston = Observation::new(
        "ADPSFC",
        "KBOS",
        T0,
        42.36,
        -71.0,
        6.0,
        "0",
        11,
        1000.0,
        2.0,
        1.75,
        "TMP",
    );

    let mut observations = vec![
        with_value(kden("ADPSFC", T0, "0", 1000.0, 2.0), -5.25),
        dew_point,
        boston,
        with_value(kden("ADPUPA", T0 + 3600, "", 850.0, 1500.0), -12.0),
        with_value(kden("ADPUPA", T0 + 3600, "", 700.0, 3000.0), -20.5),
        with_value(kden("ADPUPA", T0 + 3600, "2", 500.0, 5600.0), -31.0),
        with_value(kden("ADPSFC", T0 + 3600, "0", 1000.0, 2.0), -4.0),
    ];
    count_headers(&mut observations);
    observations
}

/// Write `observations` through `write_observations` and finalize with a
/// known observation count
pub fn write_file(
    path: &Path,
    config: WriterConfig,
    observations: &[Observation],
) -> WriteSummary {
    let mut writer = PointObsWriter::create(path, config).unwrap();
    writer.write_observations(observations).unwrap();
    writer.finalize(Some(observations.len()), None, None).unwrap()
}

pub fn read_file(path: &Path) -> Vec<Observation> {
    let mut reader = PointObsReader::open(path).unwrap();
    let count = reader.obs_count();
    reader.read_observations(0, count).unwrap()
}

/// Compare everything that survives a round trip in GRIB-code mode
pub fn assert_equivalent(expected: &[Observation], actual: &[Observation]) {
    assert_eq!(expected.len(), actual.len(), "observation count differs");
    for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
        assert!(e.has_same_header(a), "header fields differ at row {i}: {e:?} vs {a:?}");
        assert_eq!(e.header_index, a.header_index, "header index differs at row {i}");
        assert_eq!(e.quality_flag, a.quality_flag, "quality flag differs at row {i}");
        assert_eq!(e.var_code, a.var_code, "variable differs at row {i}");
        assert_eq!(e.pressure_level, a.pressure_level, "level differs at row {i}");
        assert_eq!(e.height, a.height, "height differs at row {i}");
        assert_eq!(e.value, a.value, "value differs at row {i}");
    }
}
