//! Tests for the time summary pass


use crate::models::Observation;

/// 2021-01-01T00:00:00Z
pub const DAY0: i64 = 1_609_459_200;

/// One KDEN temperature report per minute for `minutes` minutes; value = minute
pub fn minute_series(station: &str, minutes: i64) -> Vec<Observation> {
    (0..minutes)
        .map(|m| {
            Observation::new(
                "ADPSFC",
                station,
                DAY0 + m * 60,
                39.85,
                -104.66,
                1655.0,
                "0",
                11,
                1000.0,
                2.0,
                m as f32,
                "TMP",
            )
        })
        .collect()
}
