use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use log::info;
use traffic_core::{Config, GridSpec, PointSource, config::DEFAULT_TIMEZONE};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "traffic", version, about = "Hourly traffic-flow collector")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "TRAFFIC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query every point once and append the results to the CSV file.
    Collect(CollectArgs),

    /// Interactively set the API key, timezone, output file and point source.
    Configure,

    /// Print the points a collection run would query, without calling the API.
    Points(SourceArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Named,
    Grid,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Point source; overrides the config file.
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    #[arg(long, allow_hyphen_values = true)]
    pub min_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub max_lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub min_lon: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub max_lon: Option<f64>,
    /// Grid spacing in degrees.
    #[arg(long)]
    pub step: Option<f64>,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    #[command(flatten)]
    pub points: SourceArgs,

    /// CSV file to append to.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Pause after each request, in milliseconds.
    #[arg(long)]
    pub sleep_ms: Option<u64>,

    /// IANA timezone used for the date/hour columns.
    #[arg(long)]
    pub timezone: Option<String>,
}

impl SourceArgs {
    /// Resolve the point source: explicit flags win over the config file.
    /// Any grid flag implies `--source grid`.
    fn resolve(&self, current: &PointSource) -> PointSource {
        let has_grid_flags = [self.min_lat, self.max_lat, self.min_lon, self.max_lon, self.step]
            .iter()
            .any(Option::is_some);

        let kind = match (self.source, current) {
            (Some(kind), _) => kind,
            (None, _) if has_grid_flags => SourceKind::Grid,
            (None, PointSource::Named) => SourceKind::Named,
            (None, PointSource::Grid(_)) => SourceKind::Grid,
        };

        match kind {
            SourceKind::Named => PointSource::Named,
            SourceKind::Grid => {
                let base = match current {
                    PointSource::Grid(spec) => *spec,
                    PointSource::Named => GridSpec::hanoi(),
                };
                PointSource::Grid(GridSpec {
                    min_lat: self.min_lat.unwrap_or(base.min_lat),
                    max_lat: self.max_lat.unwrap_or(base.max_lat),
                    min_lon: self.min_lon.unwrap_or(base.min_lon),
                    max_lon: self.max_lon.unwrap_or(base.max_lon),
                    step: self.step.unwrap_or(base.step),
                })
            }
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Collect(args) => {
                let mut config = load_config(self.config.as_deref())?;
                config.apply_env(|k| std::env::var(k).ok());
                config.source = args.points.resolve(&config.source);
                if let Some(output) = args.output {
                    config.output = output;
                }
                if let Some(sleep_ms) = args.sleep_ms {
                    config.sleep_ms = sleep_ms;
                }
                if let Some(tz) = args.timezone {
                    config.timezone = tz;
                }

                let summary = traffic_core::run(&config).await?;

                match summary.output {
                    Some(path) => println!(
                        "Collected {}/{} points ({} missed), appended to {}",
                        summary.collected,
                        summary.attempted,
                        summary.missed,
                        path.display()
                    ),
                    None => println!("No data collected ({} points tried).", summary.attempted),
                }
            }
            Command::Configure => configure(self.config.as_deref())?,
            Command::Points(args) => {
                let config = load_config(self.config.as_deref())?;
                let points = args.resolve(&config.source).points()?;
                for (i, point) in points.iter().enumerate() {
                    println!("{:>4}  {}", i + 1, point);
                }
                println!("Total: {} points", points.len());
            }
        }

        Ok(())
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn configure(path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let mut config = load_config(path)?;

    let key = Password::new("TomTom API key (leave empty to read it from TOMTOM_API_KEY):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());

    let current_tz = config.timezone.clone();
    let tz = Text::new("Timezone for the date/hour columns:")
        .with_default(if current_tz.is_empty() { DEFAULT_TIMEZONE } else { current_tz.as_str() })
        .prompt()
        .context("Failed to read timezone")?;
    config.timezone = tz;
    config.tz()?;

    let current_output = config.output.display().to_string();
    let output = Text::new("Output CSV file:")
        .with_default(&current_output)
        .prompt()
        .context("Failed to read output path")?;
    config.output = PathBuf::from(output);

    let choice = Select::new(
        "Point source:",
        vec!["named (25 Hanoi districts)", "grid (central Hanoi bounding box)"],
    )
    .with_starting_cursor(if config.source.is_named() { 0 } else { 1 })
    .prompt()
    .context("Failed to read point source")?;
    config.source = if choice.starts_with("named") {
        PointSource::Named
    } else {
        match config.source {
            PointSource::Grid(spec) => PointSource::Grid(spec),
            PointSource::Named => PointSource::Grid(GridSpec::hanoi()),
        }
    };

    let saved_to = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };
    info!("Configuration saved to {}", saved_to.display());

    Ok(())
}
