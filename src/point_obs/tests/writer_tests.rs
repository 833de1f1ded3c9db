//! Writer behavior: staging, flushing, finalize checks and atomic output

use super::{T0, assert_equivalent, read_file, sample_observations, write_file};
use crate::config::WriterConfig;
use crate::error::{ErrorKind, PointObsError};
use crate::models::{FormatVersion, Observation, VariableIdMode, VariableTable};
use crate::point_obs::{PointObsReader, PointObsWriter};
use netcdf::AttributeValue;
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn text_attribute(value: Option<netcdf::Attribute<'_>>) -> Option<String> {
    match value.map(|a| a.value().unwrap()) {
        Some(AttributeValue::Str(text)) => Some(text),
        _ => None,
    }
}

fn assert_same_file_content(expected: &Path, actual: &Path) {
    assert_equivalent(&read_file(expected), &read_file(actual));
    let mut a = PointObsReader::open(expected).unwrap();
    let mut b = PointObsReader::open(actual).unwrap();
    assert_eq!(a.quality_table().unwrap(), b.quality_table().unwrap());
    assert_eq!(
        a.read_headers().unwrap().stations().values(),
        b.read_headers().unwrap().stations().values()
    );
}

#[test]
fn test_single_kden_observation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kden.nc");

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    let index = writer
        .register_header("ADPSFC", "KDEN", T0, 39.8, -104.7, 1650.0)
        .unwrap();
    assert_eq!(index, 0);
    assert_eq!(writer.headers().types().values(), &["ADPSFC"]);
    assert_eq!(writer.headers().stations().values(), &["KDEN"]);

    writer.stage(0, 1, 1000.0, 1650.0, -5.2, "NA").unwrap();
    let summary = writer.finalize(Some(1), Some(1), None).unwrap();
    assert_eq!(summary.observations_written, 1);
    assert_eq!(summary.headers_written, 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), summary.bytes_written);

    let mut reader = PointObsReader::open(&path).unwrap();
    let headers = reader.read_headers().unwrap();
    assert_eq!(headers.len(), 1);
    let header = headers.header(0).unwrap();
    assert_eq!(header.latitude, 39.8);
    assert_eq!(header.longitude, -104.7);
    assert_eq!(header.elevation, 1650.0);

    let observations = reader.read_observations(0, 1).unwrap();
    assert_eq!(observations.len(), 1);
    let obs = &observations[0];
    assert_eq!(obs.header_type, "ADPSFC");
    assert_eq!(obs.station_id, "KDEN");
    assert_eq!(obs.valid_time, T0);
    assert_eq!(obs.quality_flag, "NA");
    assert_eq!(obs.var_code, 1);
    assert!((obs.value - (-5.2)).abs() < 1e-5);
}

#[test]
fn test_repeated_station_is_interned_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("repeat.nc");

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0, 39.8, -104.7, 1650.0).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0 + 60, 39.8, -104.7, 1650.0).unwrap();
    assert_eq!(writer.headers().station_indices(), &[0, 0]);
    writer.stage(1, 11, 1000.0, 2.0, 3.0, "").unwrap();
    writer.finalize(None, Some(2), None).unwrap();

    let mut reader = PointObsReader::open(&path).unwrap();
    let headers = reader.read_headers().unwrap();
    assert_eq!(headers.stations().values(), &["KDEN"]);
    assert_eq!(headers.station_indices(), &[0, 0]);
    assert_eq!(headers.valid_times().len(), 2);
}

#[test]
fn test_staging_unregistered_header() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("unregistered.nc");

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0, 0.0, 0.0, 0.0).unwrap();

    match writer.stage(1, 11, 1000.0, 2.0, 3.0, "0") {
        Err(PointObsError::State { message }) => assert!(message.contains("header 1")),
        _ => panic!("Expected State error"),
    }
    assert_eq!(writer.observation_count(), 0);
    drop(writer);
    assert!(!path.exists());
}

#[test]
fn test_count_mismatch_leaves_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mismatch.nc");

    let config = WriterConfig::default().with_buffer_size(1);
    let mut writer = PointObsWriter::create(&path, config).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0, 0.0, 0.0, 0.0).unwrap();
    writer.stage(0, 11, 1000.0, 2.0, 3.0, "0").unwrap();
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);

    let err = writer.finalize(Some(5), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!path.exists());
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_header_count_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hdr.nc");

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0, 0.0, 0.0, 0.0).unwrap();
    let err = writer.finalize(None, Some(2), None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!path.exists());
}

#[test]
fn test_finalize_without_headers() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.nc");

    let writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    match writer.finalize(None, None, None) {
        Err(PointObsError::Configuration { message }) => assert!(message.contains("header")),
        _ => panic!("Expected Configuration error"),
    }
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.nc");

    let result = PointObsWriter::create(&path, WriterConfig::default().with_buffer_size(0));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Configuration);

    let config = WriterConfig::default().with_prepbufr_names(true);
    assert!(PointObsWriter::create(&path, config).is_err());
}

#[test]
fn test_buffer_threshold_does_not_change_output() {
    let temp_dir = TempDir::new().unwrap();
    let observations = sample_observations();

    let mut files = Vec::new();
    for size in [1, 7, 32_768] {
        let path = temp_dir.path().join(format!("buffer_{size}.nc"));
        let config = WriterConfig::default().with_buffer_size(size);
        let summary = write_file(&path, config, &observations);
        assert_eq!(summary.observations_written, observations.len());
        files.push(path);
    }
    assert_same_file_content(&files[0], &files[1]);
    assert_same_file_content(&files[1], &files[2]);
}

#[test]
fn test_flush_count_follows_threshold() {
    let temp_dir = TempDir::new().unwrap();
    let observations = sample_observations();

    let summary = write_file(
        &temp_dir.path().join("flushes.nc"),
        WriterConfig::default().with_buffer_size(3),
        &observations,
    );
    // 7 rows: two full buffers and the remainder at finalize
    assert_eq!(summary.buffer_flushes, 3);
    assert_eq!(summary.headers_written, 4);
    assert_eq!(summary.message_types, 2);
    assert_eq!(summary.stations, 2);
    assert_eq!(summary.valid_times, 2);
    assert_eq!(summary.quality_flags, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_flush_granularity_is_invisible(size in 1usize..12, legacy in any::<bool>()) {
        let temp_dir = TempDir::new().unwrap();
        let observations = sample_observations();
        let version = if legacy { FormatVersion::V1_0 } else { FormatVersion::V1_2 };

        let baseline = temp_dir.path().join("baseline.nc");
        write_file(&baseline, WriterConfig::default().with_version(version), &observations);
        let candidate = temp_dir.path().join("candidate.nc");
        write_file(
            &candidate,
            WriterConfig::default().with_version(version).with_buffer_size(size),
            &observations,
        );

        let expected = read_file(&baseline);
        let actual = read_file(&candidate);
        prop_assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(&actual) {
            prop_assert_eq!(e, a);
        }
    }
}

#[test]
fn test_write_observations_continues_header_numbering() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("continued.nc");
    let first = sample_observations();
    let second = sample_observations();

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    assert_eq!(writer.write_observations(&first).unwrap(), 4);
    assert_eq!(writer.write_observations(&second).unwrap(), 4);
    writer.finalize(Some(14), Some(8), None).unwrap();

    let read = read_file(&path);
    let indices: Vec<usize> = read.iter().map(|o| o.header_index).collect();
    assert_eq!(indices, vec![0, 0, 1, 2, 2, 2, 3, 4, 4, 5, 6, 6, 6, 7]);

    let mut expected = first;
    expected.extend(second.into_iter().map(|o| {
        let index = o.header_index + 4;
        o.with_header_index(index)
    }));
    assert_equivalent(&expected, &read);
}

#[test]
fn test_header_linkage_verification() {
    let temp_dir = TempDir::new().unwrap();
    let mut observations = sample_observations();
    // second row claims the first row's header but reports another station
    observations[1].station_id = "KCOS".to_string();

    let strict = WriterConfig::default().with_header_linkage_verification(true);
    let mut writer = PointObsWriter::create(temp_dir.path().join("strict.nc"), strict).unwrap();
    let err = writer.write_observations(&observations).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    let loose = temp_dir.path().join("loose.nc");
    write_file(&loose, WriterConfig::default(), &observations);
    let read = read_file(&loose);
    assert_eq!(read[1].station_id, "KDEN");
}

#[test]
fn test_raw_report_triplets() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("prepbufr.nc");

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    writer.register_header("ADPSFC", "KDEN", T0, 0.0, 0.0, 0.0).unwrap();
    writer.register_header_raw_report(181, 512, 0);
    writer.register_header("ADPSFC_mean_001000", "KDEN", T0, 0.0, 0.0, 0.0).unwrap();
    writer.stage(0, 11, 1000.0, 2.0, 3.0, "1").unwrap();
    writer.stage(1, 11, 1000.0, 2.0, 3.0, "").unwrap();
    let summary = writer.finalize(Some(2), Some(2), None).unwrap();
    assert_eq!(summary.raw_headers_written, 1);

    let mut reader = PointObsReader::open(&path).unwrap();
    assert!(reader.container().variable("hdr_prpt_typ").is_some());
    let report = reader.raw_report(0).unwrap().unwrap();
    assert_eq!(report.pb_report_type, 181);
    assert_eq!(report.in_report_type, 512);
    assert_eq!(report.instrument_type, 0);
    assert_eq!(reader.raw_report(1).unwrap(), None);
    assert_eq!(reader.raw_report(2).unwrap_err().kind(), ErrorKind::OutOfRange);
}

#[test]
fn test_variable_index_mode() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("varid.nc");

    let mut table = VariableTable::new();
    table.add("TMP", "K", "Temperature");
    let mut observations = sample_observations();
    table.assign_ids(&mut observations).unwrap();
    assert_eq!(table.names(), &["TMP", "DPT"]);

    let config = WriterConfig::default()
        .with_variable_id_mode(VariableIdMode::VariableIndex)
        .with_prepbufr_names(true);
    let mut writer = PointObsWriter::create(&path, config).unwrap();
    writer.write_observations(&observations).unwrap();
    let summary = writer.finalize(None, None, Some(&table)).unwrap();
    assert_eq!(summary.variables, 2);

    let mut reader = PointObsReader::open(&path).unwrap();
    assert!(reader.use_var_id());
    assert!(reader.container().variable("obs_gc").is_none());
    let vid = reader.container().variable("obs_vid").unwrap();
    assert_eq!(
        text_attribute(vid.attribute("long_name")).as_deref(),
        Some("index of BUFR variable corresponding to the observation type")
    );

    let variables = reader.variable_table().unwrap().unwrap();
    assert_eq!(variables.names(), &["TMP", "DPT"]);
    assert_eq!(variables.unit(0), Some("K"));
    assert_eq!(variables.description(0), Some("Temperature"));

    let read = reader.read_observations(0, observations.len()).unwrap();
    assert_equivalent(&observations, &read);
    let names: Vec<&str> = read.iter().map(|o| o.var_name.as_str()).collect();
    assert_eq!(names, vec!["TMP", "DPT", "TMP", "TMP", "TMP", "TMP", "TMP"]);
}

#[test]
fn test_variable_index_mode_requires_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("noname.nc");
    let config = WriterConfig::default().with_variable_id_mode(VariableIdMode::VariableIndex);

    let mut writer = PointObsWriter::create(&path, config.clone()).unwrap();
    writer.write_observations(&sample_observations()).unwrap();
    match writer.finalize(None, None, None) {
        Err(PointObsError::Configuration { message }) => assert!(message.contains("variable")),
        _ => panic!("Expected Configuration error"),
    }
    assert!(!path.exists());

    let mut writer = PointObsWriter::create(&path, config).unwrap();
    writer.write_observations(&sample_observations()).unwrap();
    let err = writer.finalize(None, None, Some(&VariableTable::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_trailing_whitespace_keeps_stations_apart() {
    for version in [FormatVersion::V1_2, FormatVersion::V1_0] {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("spaces.nc");

        let config = WriterConfig::default().with_version(version);
        let mut writer = PointObsWriter::create(&path, config).unwrap();
        writer.register_header("ADPSFC", "KDEN", T0, 39.8, -104.7, 1650.0).unwrap();
        writer.register_header("ADPSFC", "KDEN ", T0, 39.8, -104.7, 1650.0).unwrap();
        writer.stage(0, 11, 1000.0, 2.0, 1.0, "0").unwrap();
        writer.stage(1, 11, 1000.0, 2.0, 2.0, "0").unwrap();
        writer.finalize(Some(2), Some(2), None).unwrap();

        let mut reader = PointObsReader::open(&path).unwrap();
        assert_eq!(reader.read_headers().unwrap().stations().values(), &["KDEN", "KDEN "]);
        let read = reader.read_observations(0, 2).unwrap();
        assert_eq!(read[0].station_id, "KDEN");
        assert_eq!(read[1].station_id, "KDEN ");
    }
}

#[test]
fn test_over_width_stations_read_back_truncated() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("long.nc");
    let prefix = "X".repeat(40);

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    let first = format!("{prefix}A");
    let second = format!("{prefix}B");
    writer.register_header("ADPSFC", &first, T0, 0.0, 0.0, 0.0).unwrap();
    writer.register_header("ADPSFC", &second, T0, 0.0, 0.0, 0.0).unwrap();
    assert_eq!(writer.headers().stations().len(), 1);
    writer.stage(0, 11, 1000.0, 2.0, 1.0, "a-very-long-quality-flag").unwrap();
    writer.stage(1, 11, 1000.0, 2.0, 2.0, "0").unwrap();
    writer.finalize(Some(2), Some(2), None).unwrap();

    let mut reader = PointObsReader::open(&path).unwrap();
    let read = reader.read_observations(0, 2).unwrap();
    assert_eq!(read[0].station_id, prefix);
    assert_eq!(read[1].station_id, prefix);
    assert_eq!(read[1].header_index, 1);
    assert_eq!(read[0].quality_flag, "a-very-long-qual");
}

#[test]
fn test_layout_attributes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("attrs.nc");
    let config = WriterConfig::default().with_height_above_ground(true);
    write_file(&path, config, &sample_observations());

    let reader = PointObsReader::open(&path).unwrap();
    let nc = reader.container();
    assert_eq!(text_attribute(nc.attribute("MET_Obs_version")).as_deref(), Some("1.02"));
    assert_eq!(text_attribute(nc.attribute("use_var_id")).as_deref(), Some("false"));
    let hgt = nc.variable("obs_hgt").unwrap();
    assert_eq!(
        text_attribute(hgt.attribute("long_name")).as_deref(),
        Some("height in meters above sea level or ground level (msl or agl)")
    );
    let vld = nc.variable("hdr_vld_table").unwrap();
    assert_eq!(
        text_attribute(vld.attribute("units")).as_deref(),
        Some("YYYYMMDD_HHMMSS UTC")
    );
    assert_eq!(nc.dimension_len("mxstr2"), Some(40));
    assert!(nc.dimension("nobs").unwrap().is_unlimited());
}

#[test]
fn test_observations_use_record_dimension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("streaming.nc");

    let observations: Vec<Observation> = sample_observations();
    let config = WriterConfig::default().with_buffer_size(2);
    let mut writer = PointObsWriter::create(&path, config).unwrap();
    writer.write_observations(&observations).unwrap();
    writer.finalize(None, None, None).unwrap();

    let reader = PointObsReader::open(&path).unwrap();
    assert!(reader.container().dimension("nobs").unwrap().is_unlimited());
    assert_eq!(reader.obs_count(), observations.len());
    assert_equivalent(&observations, &read_file(&path));
}
