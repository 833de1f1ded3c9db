//! Summary statistics applied to the values of one group.

use crate::constants::FILL_VALUE;
use crate::error::{PointObsError, Result};
use std::fmt;
use std::str::FromStr;

/// A statistic named in a time summary's `type` list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStat {
    Mean,
    /// Sample standard deviation (n - 1)
    Stdev,
    Min,
    Max,
    Range,
    Median,
    /// `pNN`: the NN-th percentile, linearly interpolated
    Percentile(u8),
}

impl SummaryStat {
    /// Compute the statistic over `values`, ignoring fill values and NaN.
    /// Returns the fill value when too few valid values remain.
    pub fn compute(&self, values: &[f32]) -> f32 {
        let mut valid: Vec<f64> = values
            .iter()
            .filter(|v| is_valid(**v))
            .map(|&v| v as f64)
            .collect();
        if valid.is_empty() {
            return FILL_VALUE;
        }
        let n = valid.len() as f64;

        let result = match self {
            SummaryStat::Mean => valid.iter().sum::<f64>() / n,
            SummaryStat::Stdev => {
                if valid.len() < 2 {
                    return FILL_VALUE;
                }
                let mean = valid.iter().sum::<f64>() / n;
                let ss: f64 = valid.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (n - 1.0)).sqrt()
            }
            SummaryStat::Min => valid.iter().copied().fold(f64::INFINITY, f64::min),
            SummaryStat::Max => valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            SummaryStat::Range => {
                let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
                let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                max - min
            }
            SummaryStat::Median => percentile(&mut valid, 50.0),
            SummaryStat::Percentile(p) => percentile(&mut valid, *p as f64),
        };
        result as f32
    }
}

/// Count of values that take part in a statistic
pub fn valid_count(values: &[f32]) -> usize {
    values.iter().filter(|v| is_valid(**v)).count()
}

fn is_valid(value: f32) -> bool {
    !value.is_nan() && value != FILL_VALUE
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = p / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (rank - lo as f64)
}

impl FromStr for SummaryStat {
    type Err = PointObsError;

    fn from_str(name: &str) -> Result<Self> {
        match name.trim() {
            "mean" => Ok(SummaryStat::Mean),
            "stdev" => Ok(SummaryStat::Stdev),
            "min" => Ok(SummaryStat::Min),
            "max" => Ok(SummaryStat::Max),
            "range" => Ok(SummaryStat::Range),
            "median" => Ok(SummaryStat::Median),
            other => other
                .strip_prefix('p')
                .and_then(|digits| digits.parse::<u8>().ok())
                .filter(|&p| p <= 100)
                .map(SummaryStat::Percentile)
                .ok_or_else(|| {
                    PointObsError::configuration(format!("unknown summary type '{other}'"))
                }),
        }
    }
}

impl fmt::Display for SummaryStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryStat::Mean => write!(f, "mean"),
            SummaryStat::Stdev => write!(f, "stdev"),
            SummaryStat::Min => write!(f, "min"),
            SummaryStat::Max => write!(f, "max"),
            SummaryStat::Range => write!(f, "range"),
            SummaryStat::Median => write!(f, "median"),
            SummaryStat::Percentile(p) => write!(f, "p{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f32; 5] = [1.0, 2.0, 3.0, 4.0, 10.0];

    #[test]
    fn test_parse_names() {
        assert_eq!("mean".parse::<SummaryStat>().unwrap(), SummaryStat::Mean);
        assert_eq!("p80".parse::<SummaryStat>().unwrap(), SummaryStat::Percentile(80));
        assert_eq!(SummaryStat::Percentile(5).to_string(), "p5");
        assert!("p".parse::<SummaryStat>().is_err());
        assert!("p101".parse::<SummaryStat>().is_err());
        assert!("mode".parse::<SummaryStat>().is_err());
    }

    #[test]
    fn test_basic_statistics() {
        assert_eq!(SummaryStat::Mean.compute(&VALUES), 4.0);
        assert_eq!(SummaryStat::Min.compute(&VALUES), 1.0);
        assert_eq!(SummaryStat::Max.compute(&VALUES), 10.0);
        assert_eq!(SummaryStat::Range.compute(&VALUES), 9.0);
        assert_eq!(SummaryStat::Median.compute(&VALUES), 3.0);
        let stdev = SummaryStat::Stdev.compute(&VALUES);
        assert!((stdev - 3.535_534).abs() < 1e-5);
    }

    #[test]
    fn test_percentile_interpolates() {
        // rank 0.25 * 3 = 0.75 between 10 and 20
        let p = SummaryStat::Percentile(25).compute(&[40.0, 10.0, 30.0, 20.0]);
        assert!((p - 17.5).abs() < 1e-6);
        assert_eq!(SummaryStat::Median.compute(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn test_fill_values_are_ignored() {
        let values = [FILL_VALUE, 2.0, 4.0, f32::NAN];
        assert_eq!(valid_count(&values), 2);
        assert_eq!(SummaryStat::Mean.compute(&values), 3.0);
        assert_eq!(SummaryStat::Mean.compute(&[FILL_VALUE]), FILL_VALUE);
        assert_eq!(SummaryStat::Stdev.compute(&[5.0]), FILL_VALUE);
    }
}
