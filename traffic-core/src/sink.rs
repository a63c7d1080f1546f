use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::debug;

use crate::model::TrafficRecord;

/// Column set of the output file. Grid points carry no name, so their
/// files have no `location_name` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Named,
    Grid,
}

impl Layout {
    pub fn header(self) -> &'static [&'static str] {
        match self {
            Layout::Named => &[
                "date",
                "hour",
                "location_name",
                "lat",
                "lon",
                "currentSpeed",
                "freeFlowSpeed",
                "congestion_ratio",
                "traffic_density",
            ],
            Layout::Grid => &[
                "date",
                "hour",
                "lat",
                "lon",
                "currentSpeed",
                "freeFlowSpeed",
                "congestion_ratio",
                "traffic_density",
            ],
        }
    }

    fn row(self, rec: &TrafficRecord) -> Vec<String> {
        let mut row = vec![rec.date.clone(), rec.hour.clone()];
        if self == Layout::Named {
            row.push(rec.location_name.clone().unwrap_or_default());
        }
        row.push(float_field(rec.lat));
        row.push(float_field(rec.lon));
        row.push(speed_field(rec.current_speed));
        row.push(speed_field(rec.free_flow_speed));
        row.push(float_field(rec.congestion_ratio));
        row.push(float_field(rec.traffic_density));
        row
    }
}

/// Coordinates and ratios always keep a decimal point (`21.0`, `1.0`),
/// matching rows already written by the earlier collector.
fn float_field(v: f64) -> String {
    format!("{v:?}")
}

/// Speeds arrive as integers from the API and are written without a
/// fractional part when they have none (`30`, `27.5`).
fn speed_field(v: f64) -> String {
    v.to_string()
}

/// Append-only CSV log of traffic records.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    layout: Layout,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, layout: Layout) -> Self {
        Self { path: path.into(), layout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `records`, writing the header first only if the file is new
    /// or empty. An existing file must carry this sink's header, otherwise
    /// nothing is written. Returns the number of rows written.
    pub fn append(&self, records: &[TrafficRecord]) -> Result<usize> {
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        if !needs_header {
            self.check_existing_header()?;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if needs_header {
            debug!("Writing header to new file {}", self.path.display());
            writer.write_record(self.layout.header()).context("Failed to write CSV header")?;
        }

        for rec in records {
            writer.write_record(self.layout.row(rec)).context("Failed to write CSV row")?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", self.path.display()))?;

        Ok(records.len())
    }

    fn check_existing_header(&self) -> Result<()> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;

        let mut found = StringRecord::new();
        reader
            .read_record(&mut found)
            .with_context(|| format!("Failed to read header of {}", self.path.display()))?;

        let expected = self.layout.header();
        if found.iter().map(str::trim).ne(expected.iter().copied()) {
            bail!(
                "Output file {} has columns [{}], expected [{}] for {:?} points; \
                 use a different output file when switching point source",
                self.path.display(),
                found.iter().collect::<Vec<_>>().join(","),
                expected.join(","),
                self.layout,
            );
        }
        Ok(())
    }
}
