//! Summary time windows.
//!
//! Intervals are generated day by day. On each day the base times start at
//! the earliest time of day congruent to `begin` modulo `step`, so every day
//! lines up with the configured start time.

use crate::error::{PointObsError, Result};

pub const SECONDS_PER_DAY: i64 = 86_400;

/// One summary window around a base time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSummaryInterval {
    base: i64,
    start: i64,
    end: i64,
}

impl TimeSummaryInterval {
    /// Window `[base - width_beg, base + width_end)`
    pub fn new(base: i64, width_beg: i32, width_end: i32) -> Self {
        Self {
            base,
            start: base - width_beg as i64,
            end: base + width_end as i64,
        }
    }

    /// Valid time given to the summary rows of this window
    pub fn base_time(&self) -> i64 {
        self.base
    }

    pub fn start_time(&self) -> i64 {
        self.start
    }

    /// Exclusive end of the window
    pub fn end_time(&self) -> i64 {
        self.end
    }
}

/// True when the time of day of `time` lies within `[begin, end]`.
/// A window with `end < begin` spans midnight; `begin == end` accepts all times.
pub fn is_in_time_interval(time: i64, begin_secs: i32, end_secs: i32) -> bool {
    if begin_secs == end_secs {
        return true;
    }
    let secs = time.rem_euclid(SECONDS_PER_DAY) as i32;
    if begin_secs < end_secs {
        secs >= begin_secs && secs <= end_secs
    } else {
        secs <= end_secs || secs >= begin_secs
    }
}

/// Windows whose base times lie in `first..last` and fall within the
/// `begin`/`end` time-of-day window. A base equal to `last` opens no window.
pub fn time_intervals(
    first: i64,
    last: i64,
    begin_secs: i32,
    end_secs: i32,
    step: i32,
    width_beg: i32,
    width_end: i32,
) -> Vec<TimeSummaryInterval> {
    let mut intervals = Vec::new();
    if step <= 0 || last < first {
        return intervals;
    }
    let step = step as i64;
    let offset = (begin_secs as i64).rem_euclid(step);

    let mut day = first.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
    while day < last {
        let mut base = day + offset;
        while base < day + SECONDS_PER_DAY && base < last {
            if is_in_time_interval(base, begin_secs, end_secs) {
                intervals.push(TimeSummaryInterval::new(base, width_beg, width_end));
            }
            base += step;
        }
        day += SECONDS_PER_DAY;
    }
    intervals
}

/// Format a duration or time of day in seconds as `HHMMSS`
pub fn secs_to_hhmmss(secs: i32) -> String {
    let secs = secs.max(0);
    format!("{:02}{:02}{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Parse `HHMMSS` (or `HHMM`, `HH`) into seconds of day
pub fn hhmmss_to_secs(text: &str) -> Result<i32> {
    let text = text.trim();
    let invalid = || PointObsError::configuration(format!("invalid HHMMSS time '{text}'"));
    if text.is_empty()
        || text.len() > 6
        || text.len() % 2 != 0
        || !text.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let padded = format!("{text:0<6}");
    let field =
        |range: std::ops::Range<usize>| padded[range].parse::<i32>().map_err(|_| invalid());
    let (h, m, s) = (field(0..2)?, field(2..4)?, field(4..6)?);
    if h > 24 || m > 59 || s > 59 {
        return Err(invalid());
    }
    Ok(h * 3600 + m * 60 + s)
}
