//! Sweep results and CSV export.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One sweep step's aggregate numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRow {
    /// Swept value: parallelism, request size or chunk size.
    pub x: u64,
    pub latency_ms: f64,
    pub mbps: f64,
    pub qps: f64,
}

/// Rows collected over one sweep, in the order the steps ran.
#[derive(Debug, Default)]
pub struct ResultSeries {
    rows: Vec<ResultRow>,
}

impl ResultSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    /// Renders the series as CSV, one row per step.
    ///
    /// A column whose value is zero in every row carries no information
    /// (for instance upload speed in a download-only shape) and is left out
    /// entirely. An empty series still renders the full header line.
    pub fn to_csv(&self) -> String {
        const HEADERS: [&str; 4] = ["x_axis", "latency(ms)", "speed(MB/s)", "qps"];

        let keep = if self.rows.is_empty() {
            [true; 4]
        } else {
            [
                self.rows.iter().any(|row| row.x != 0),
                self.rows.iter().any(|row| row.latency_ms != 0.0),
                self.rows.iter().any(|row| row.mbps != 0.0),
                self.rows.iter().any(|row| row.qps != 0.0),
            ]
        };

        let mut out = String::new();
        let header: Vec<&str> = HEADERS
            .iter()
            .zip(keep)
            .filter_map(|(name, kept)| kept.then_some(*name))
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');

        for row in &self.rows {
            let mut cells: Vec<String> = Vec::with_capacity(4);
            if keep[0] {
                cells.push(row.x.to_string());
            }
            if keep[1] {
                cells.push(format!("{:.3}", row.latency_ms));
            }
            if keep[2] {
                cells.push(format!("{:.3}", row.mbps));
            }
            if keep[3] {
                cells.push(format!("{:.1}", row.qps));
            }
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// Writes the series under `dir`, creating it if needed. The file name
    /// carries the sweep dimension and the run label so parallel sweeps
    /// never collide.
    pub fn write_csv(&self, dir: &Path, dimension_tag: &str, label: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("echo_{dimension_tag}_{label}.csv"));
        fs::write(&path, self.to_csv())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: u64, latency_ms: f64, mbps: f64, qps: f64) -> ResultRow {
        ResultRow {
            x,
            latency_ms,
            mbps,
            qps,
        }
    }

    #[test]
    fn renders_all_columns_when_populated() {
        let mut series = ResultSeries::new();
        series.push(row(1, 1.5, 12.0, 1000.0));
        series.push(row(5, 2.25, 13.5, 1250.5));
        assert_eq!(
            series.to_csv(),
            "x_axis,latency(ms),speed(MB/s),qps\n\
             1,1.500,12.000,1000.0\n\
             5,2.250,13.500,1250.5\n"
        );
    }

    #[test]
    fn drops_an_all_zero_column() {
        let mut series = ResultSeries::new();
        series.push(row(1, 1.5, 0.0, 1000.0));
        series.push(row(5, 2.25, 0.0, 1250.5));
        assert_eq!(
            series.to_csv(),
            "x_axis,latency(ms),qps\n1,1.500,1000.0\n5,2.250,1250.5\n"
        );
    }

    #[test]
    fn keeps_a_column_with_a_single_nonzero_row() {
        let mut series = ResultSeries::new();
        series.push(row(1, 1.5, 0.0, 1000.0));
        series.push(row(5, 2.25, 8.0, 1250.5));
        assert!(series.to_csv().starts_with("x_axis,latency(ms),speed(MB/s),qps\n"));
    }

    #[test]
    fn empty_series_is_just_the_header() {
        assert_eq!(
            ResultSeries::new().to_csv(),
            "x_axis,latency(ms),speed(MB/s),qps\n"
        );
    }

    #[test]
    fn preserves_insertion_order() {
        let mut series = ResultSeries::new();
        for x in [9u64, 1, 5] {
            series.push(row(x, 1.0, 1.0, 1.0));
        }
        let xs: Vec<u64> = series.rows().iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![9, 1, 5]);
    }

    #[test]
    fn writes_a_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut series = ResultSeries::new();
        series.push(row(1, 1.0, 2.0, 3.0));
        let path = series
            .write_csv(dir.path(), "parallel", "proto_reqsz(4k)")
            .unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("echo_parallel_proto_reqsz(4k).csv")
        );
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, series.to_csv());
    }
}
