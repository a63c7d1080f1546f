//! Core library for the `traffic` collector.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The point sources (curated districts or a generated grid)
//! - Abstraction over traffic-flow providers, with a TomTom implementation
//! - The sequential collector loop and the append-only CSV sink
//!
//! It is used by `traffic-cli`, but can also be reused by other binaries or services.

pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod points;
pub mod provider;
pub mod sink;

use std::{path::PathBuf, time::Duration};

use log::info;

pub use collector::{Collection, Collector};
pub use config::Config;
pub use error::{ConfigError, FetchError};
pub use model::{FlowReading, Point, TrafficRecord};
pub use points::{GridSpec, PointSource};
pub use provider::{TrafficProvider, provider_from_config};
pub use sink::{CsvSink, Layout};

/// Outcome of one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub attempted: usize,
    pub collected: usize,
    pub missed: usize,
    /// Where rows were appended; `None` when nothing was collected and the
    /// output file was left alone.
    pub output: Option<PathBuf>,
}

/// Run one full pass with the provider described by `config`.
///
/// Configuration problems (no API key, bad timezone, bad grid) are returned
/// before any request is made or any file is touched.
pub async fn run(config: &Config) -> anyhow::Result<RunSummary> {
    config.tz()?;
    config.source.points()?;
    let provider = provider_from_config(config)?;
    run_with_provider(config, provider.as_ref()).await
}

pub async fn run_with_provider(
    config: &Config,
    provider: &dyn TrafficProvider,
) -> anyhow::Result<RunSummary> {
    let tz = config.tz()?;
    let points = config.source.points()?;

    info!("Collecting traffic data for {} points (timezone {tz})", points.len());

    let collection = Collector::new(provider, tz)
        .with_delay(Duration::from_millis(config.sleep_ms))
        .collect(&points)
        .await;

    let mut summary = RunSummary {
        attempted: collection.attempted,
        collected: collection.records.len(),
        missed: collection.missed,
        output: None,
    };

    if collection.is_empty() {
        info!("No data collected.");
        return Ok(summary);
    }

    let layout = if config.source.is_named() { Layout::Named } else { Layout::Grid };
    let sink = CsvSink::new(&config.output, layout);
    sink.append(&collection.records)?;

    info!("Done. Saved {} rows to {}", summary.collected, sink.path().display());
    summary.output = Some(sink.path().to_path_buf());

    Ok(summary)
}
