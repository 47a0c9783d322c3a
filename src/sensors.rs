//! Measurement log input and output.
//!
//! One record per line, whitespace separated:
//!
//! ```text
//! L <px> <py> <timestamp_us> [<x_gt> <y_gt> <vx_gt> <vy_gt> [<yaw_gt> <yawrate_gt>]]
//! R <rho> <phi> <rho_dot> <timestamp_us> [<x_gt> <y_gt> <vx_gt> <vy_gt> [<yaw_gt> <yawrate_gt>]]
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Files ending in `.gz`
//! are decompressed transparently.

use flate2::read::GzDecoder;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{TrackerError, TrackerResult};
use crate::types::{GroundTruth, MeasurementPackage, SensorKind};

/// One logged measurement with optional ground truth
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub package: MeasurementPackage,
    pub ground_truth: Option<GroundTruth>,
}

/// Parsed log: accepted records in file order plus per-line rejections
#[derive(Clone, Debug, Default)]
pub struct LogParse {
    pub records: Vec<LogRecord>,
    pub rejected: Vec<TrackerError>,
}

fn invalid(line: usize, reason: impl Into<String>) -> TrackerError {
    TrackerError::InvalidRecord {
        line,
        reason: reason.into(),
    }
}

/// Parse one line; `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> TrackerResult<Option<LogRecord>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.split_whitespace();
    let sensor = match fields.next() {
        Some("L") => SensorKind::Lidar,
        Some("R") => SensorKind::Radar,
        Some(tag) => return Err(invalid(line_no, format!("unknown sensor tag '{}'", tag))),
        None => return Ok(None),
    };
    let rest: Vec<&str> = fields.collect();

    let dim = sensor.measurement_dim();
    let gt_fields = rest.len().checked_sub(dim + 1);
    if !matches!(gt_fields, Some(0) | Some(4) | Some(6)) {
        return Err(invalid(
            line_no,
            format!(
                "{} record needs {} values, a timestamp and 0, 4 or 6 ground truth values, got {} fields",
                sensor,
                dim,
                rest.len()
            ),
        ));
    }

    let number = |s: &str| -> TrackerResult<f64> {
        s.parse::<f64>()
            .map_err(|_| invalid(line_no, format!("'{}' is not a number", s)))
    };

    let raw = rest[..dim].iter().map(|s| number(s)).collect::<TrackerResult<Vec<f64>>>()?;
    let timestamp_us = rest[dim]
        .parse::<i64>()
        .map_err(|_| invalid(line_no, format!("'{}' is not an integer timestamp", rest[dim])))?;

    let ground_truth = if rest.len() > dim + 1 {
        let gt = rest[dim + 1..dim + 5]
            .iter()
            .map(|s| number(s))
            .collect::<TrackerResult<Vec<f64>>>()?;
        Some(GroundTruth {
            px: gt[0],
            py: gt[1],
            vx: gt[2],
            vy: gt[3],
        })
    } else {
        None
    };

    Ok(Some(LogRecord {
        package: MeasurementPackage::new(sensor, timestamp_us, raw),
        ground_truth,
    }))
}

/// Parse a whole log. Bad lines are collected, not fatal; I/O errors are.
pub fn parse_log<R: BufRead>(reader: R) -> TrackerResult<LogParse> {
    let mut parsed = LogParse::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_line(idx + 1, &line) {
            Ok(Some(record)) => parsed.records.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!("[LOG] {}", err);
                parsed.rejected.push(err);
            }
        }
    }
    debug!(
        "[LOG] Parsed {} records, rejected {}",
        parsed.records.len(),
        parsed.rejected.len()
    );
    Ok(parsed)
}

pub fn read_log(path: &Path) -> TrackerResult<LogParse> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        parse_log(BufReader::new(gz))
    } else {
        parse_log(BufReader::new(file))
    }
}

/// Write records in the same line format `parse_log` reads
pub fn write_log<W: Write>(records: &[LogRecord], mut writer: W) -> TrackerResult<()> {
    for record in records {
        let package = &record.package;
        let tag = match package.sensor {
            SensorKind::Lidar => "L",
            SensorKind::Radar => "R",
        };
        write!(writer, "{}", tag)?;
        for value in &package.raw {
            write!(writer, "\t{}", value)?;
        }
        write!(writer, "\t{}", package.timestamp_us)?;
        if let Some(gt) = &record.ground_truth {
            for value in gt.as_array() {
                write!(writer, "\t{}", value)?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}
