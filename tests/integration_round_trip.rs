//! Integration tests for the point observation store
//!
//! These tests drive the public API end to end: a surface network is
//! written with variable names and a time summary, read back in chunks,
//! written again in the legacy layout and upgraded to the indexed layout.

use point_obs_nc::{
    ErrorKind, FormatVersion, Observation, PointObsReader, PointObsWriter, ReaderConfig,
    SummaryAdapter, TimeSummary, TimeSummaryInfo, VariableIdMode, VariableTable, WriterConfig,
    count_headers, detect_version, rewrite,
};
use std::path::Path;
use tempfile::TempDir;

/// 2021-06-01T00:00:00Z
const DAY: i64 = 1_622_505_600;

/// One temperature report per minute from three stations, offset per
/// station so summaries can be told apart
fn surface_network(minutes: i64) -> Vec<Observation> {
    let stations = [
        ("KDEN", 39.85, -104.66, 1655.0, 0.0),
        ("KBOS", 42.36, -71.01, 6.0, 100.0),
        ("KSEA", 47.45, -122.31, 131.0, 200.0),
    ];
    let mut observations = Vec::new();
    for (station, lat, lon, elv, offset) in stations {
        for m in 0..minutes {
            observations.push(Observation::new(
                "ADPSFC",
                station,
                DAY + m * 60,
                lat,
                lon,
                elv,
                if m % 7 == 0 { "1" } else { "0" },
                11,
                1013.0,
                2.0,
                offset + m as f32,
                "TMP",
            ));
        }
    }
    count_headers(&mut observations);
    observations
}

fn read_all(path: &Path, chunk_size: usize) -> Vec<Observation> {
    let mut reader =
        PointObsReader::open_with_config(path, ReaderConfig::default().with_chunk_size(chunk_size))
            .unwrap();
    reader.observations().collect::<Result<_, _>>().unwrap()
}

#[test]
fn test_network_with_variable_names_and_summary() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("network.nc");

    let mut raw = surface_network(30);
    let mut variables = VariableTable::new();
    variables.add("TMP", "K", "Temperature");
    variables.assign_ids(&mut raw).unwrap();

    let info = TimeSummaryInfo::new()
        .with_step(600)
        .with_width(600)
        .with_types(vec!["mean".to_string()])
        .with_keep_raw(true);
    let summary = TimeSummary::summarize(&raw, &info).unwrap();
    assert_eq!(summary.summary_header_count(), 9);

    let config = WriterConfig::default()
        .with_buffer_size(16)
        .with_variable_id_mode(VariableIdMode::VariableIndex);
    let mut writer = PointObsWriter::create(&path, config).unwrap();
    writer.write_with_summary(&raw, &summary).unwrap();
    let stats = writer.finalize(Some(99), Some(99), Some(&variables)).unwrap();

    assert_eq!(stats.observations_written, 90 + 9);
    assert_eq!(stats.headers_written, 90 + 9);
    assert_eq!(stats.stations, 3);
    assert_eq!(stats.message_types, 2);
    assert_eq!(stats.quality_flags, 3);
    assert_eq!(stats.variables, 1);
    assert!(stats.bytes_written > 0);

    assert_eq!(detect_version(&path).unwrap(), FormatVersion::V1_2);
    let read = read_all(&path, 7);
    assert_eq!(read.len(), 99);
    for (written, decoded) in raw.iter().zip(&read) {
        assert_eq!(written.station_id, decoded.station_id);
        assert_eq!(written.valid_time, decoded.valid_time);
        assert_eq!(written.quality_flag, decoded.quality_flag);
        assert_eq!(written.value, decoded.value);
        assert_eq!(decoded.var_name, "TMP");
    }

    let summaries = &read[90..];
    let stations: Vec<&str> = summaries.iter().map(|o| o.station_id.as_str()).collect();
    assert_eq!(
        stations,
        vec!["KDEN", "KBOS", "KSEA", "KDEN", "KBOS", "KSEA", "KDEN", "KBOS", "KSEA"]
    );
    assert_eq!(summaries[0].header_type, "ADPSFC_mean_001000");
    assert_eq!(summaries[0].value, 2.0);
    assert_eq!(summaries[1].value, 102.0);
    assert_eq!(summaries[5].valid_time, DAY + 600);
    assert_eq!(summaries[5].value, 209.5);
    assert!(summaries.iter().all(|o| o.quality_flag == "NA"));
    assert_eq!(summaries[8].header_index, 98);

    let reader = PointObsReader::open(&path).unwrap();
    let attributes = reader.summary_attributes().unwrap().unwrap();
    assert_eq!(attributes.step, 600);
    assert_eq!(attributes.types, vec!["mean"]);
}

#[test]
fn test_legacy_file_upgrades_to_indexed_layout() {
    let temp_dir = TempDir::new().unwrap();
    let legacy = temp_dir.path().join("legacy.nc");
    let upgraded = temp_dir.path().join("upgraded.nc");
    let observations = surface_network(12);

    let config = WriterConfig::default()
        .with_version(FormatVersion::V1_0)
        .with_buffer_size(5);
    let mut writer = PointObsWriter::create(&legacy, config).unwrap();
    writer.write_observations(&observations).unwrap();
    writer.finalize(Some(observations.len()), None, None).unwrap();
    assert_eq!(detect_version(&legacy).unwrap(), FormatVersion::V1_0);

    let mut source = PointObsReader::open(&legacy).unwrap();
    let stats = rewrite(&mut source, &upgraded, WriterConfig::default()).unwrap();
    assert_eq!(stats.observations_written, 36);
    assert_eq!(stats.headers_written, 36);

    assert_eq!(detect_version(&upgraded).unwrap(), FormatVersion::V1_2);
    let before = read_all(&legacy, 1024);
    let after = read_all(&upgraded, 4);
    assert_eq!(before, after);
    assert_eq!(after[13].station_id, "KBOS");
    assert_eq!(after[13].value, 101.0);
}

#[test]
fn test_failed_session_publishes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("never.nc");
    let observations = surface_network(3);

    let mut writer = PointObsWriter::create(&path, WriterConfig::default()).unwrap();
    writer.write_observations(&observations).unwrap();
    let err = writer.finalize(Some(observations.len() + 1), None, None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!path.exists());
    assert_eq!(PointObsReader::open(&path).unwrap_err().kind(), ErrorKind::Io);
}
