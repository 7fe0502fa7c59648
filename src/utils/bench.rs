//! Result records and CSV export.

use crate::harness::TimingSummary;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// One measured `(kernel variant, process count, size)` combination
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRecord {
    pub kernel: String,
    pub variant: String,
    pub processes: usize,
    pub size: usize,
    /// Minimum over repeats, in seconds
    pub time_s: f64,
    pub result: Option<f64>,
    #[serde(skip)]
    pub median_s: f64,
    /// Coefficient of variation over repeats
    #[serde(skip)]
    pub cv: f64,
}

impl ResultRecord {
    pub fn new(
        kernel: &str,
        variant: String,
        processes: usize,
        size: usize,
        timing: &TimingSummary,
        result: Option<f64>,
    ) -> Self {
        Self {
            kernel: kernel.to_string(),
            variant,
            processes,
            size,
            time_s: timing.min_seconds(),
            result,
            median_s: timing.median.as_secs_f64(),
            cv: coefficient_of_variation(timing),
        }
    }
}

/// Export records to a CSV file, one row per record.
pub fn export_csv(path: impl AsRef<Path>, records: &[ResultRecord]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_csv(&mut file, records)?;
    file.flush()
}

pub fn write_csv<W: Write>(out: &mut W, records: &[ResultRecord]) -> std::io::Result<()> {
    writeln!(out, "kernel,variant,processes,size,time_s,result")?;
    for record in records {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            record.kernel,
            record.variant,
            record.processes,
            record.size,
            record.time_s,
            record.result.map(|v| v.to_string()).unwrap_or_default()
        )?;
    }
    Ok(())
}

fn coefficient_of_variation(timing: &TimingSummary) -> f64 {
    let mean = timing.mean.as_secs_f64();
    if mean > 0.0 {
        calculate_std_dev(&timing.samples, timing.mean).as_secs_f64() / mean
    } else {
        0.0
    }
}

/// Calculate standard deviation from a list of durations
pub fn calculate_std_dev(times: &[Duration], mean: Duration) -> Duration {
    if times.len() < 2 {
        return Duration::ZERO;
    }

    let mean_ns = mean.as_nanos() as f64;
    let variance: f64 = times
        .iter()
        .map(|t| {
            let diff = t.as_nanos() as f64 - mean_ns;
            diff * diff
        })
        .sum::<f64>()
        / (times.len() - 1) as f64;

    Duration::from_nanos(variance.sqrt() as u64)
}

/// Get a seed from current time for randomization
pub fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x12345678)
}

/// Format seconds with an adaptive unit
pub fn format_seconds(seconds: f64) -> String {
    if seconds >= 1.0 {
        format!("{:.3} s", seconds)
    } else if seconds >= 1e-3 {
        format!("{:.3} ms", seconds * 1e3)
    } else if seconds >= 1e-6 {
        format!("{:.3} µs", seconds * 1e6)
    } else {
        format!("{:.0} ns", seconds * 1e9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kernel: &str, result: Option<f64>) -> ResultRecord {
        let timing = TimingSummary::from_samples(vec![Duration::from_millis(2), Duration::from_millis(4)]);
        ResultRecord::new(kernel, "default".to_string(), 4, 600, &timing, result)
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_csv(&mut out, &[record("dot", Some(1.5)), record("ping_pong", None)]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "kernel,variant,processes,size,time_s,result");
        assert_eq!(lines[1], "dot,default,4,600,0.002,1.5");
        assert_eq!(lines[2], "ping_pong,default,4,600,0.002,");
    }

    #[test]
    fn test_record_statistics() {
        let r = record("dot", None);
        assert_eq!(r.time_s, 0.002);
        assert_eq!(r.median_s, 0.004);
        assert!(r.cv > 0.0);
    }

    #[test]
    fn test_std_dev_of_single_sample() {
        assert_eq!(calculate_std_dev(&[Duration::from_secs(1)], Duration::from_secs(1)), Duration::ZERO);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(2.0), "2.000 s");
        assert_eq!(format_seconds(0.0015), "1.500 ms");
        assert_eq!(format_seconds(2.5e-6), "2.500 µs");
    }
}
