use anyhow::{Context, Error, Result};
use cli::Args;
use collector::collect;
use config::{load_config, InfluxSettings};
use csv_importer::import_csv;
use error::ConfigError;
use influx_writer::write_points;
use log::{info, trace};
use overrides::{apply_overrides, TagOverrides};
use point::Point;
use speedtest::{HttpSpeedTest, SpeedTestProvider};
use std::fs::File;
use std::path::Path;
use std::time::Instant;

pub mod cli;
pub mod collector;
pub mod config;
pub mod csv_importer;
pub mod error;
pub mod influx_writer;
pub mod logging;
pub mod overrides;
pub mod point;
pub mod speedtest;

/// The machine's network name, resolved each time it is asked for.
pub fn local_hostname() -> Result<String, Error> {
    let hostname = hostname::get().context("Failed to resolve the local hostname")?;
    Ok(hostname.to_string_lossy().into_owned())
}

/// Loads the config file and validates its `[influxdb]` section.
pub fn load_settings(path: &Path) -> Result<InfluxSettings, ConfigError> {
    let config = load_config(path)?;
    InfluxSettings::from_ini(&config, path)
}

fn import_points(path: &Path, hostname: &str, skip_header: bool) -> Result<Vec<Point>, Error> {
    let function_start = Instant::now();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let points = import_csv(file, hostname, skip_header).collect::<Result<Vec<_>, _>>()?;
    info!("Imported {} points from {}", points.len(), path.display());
    trace!("import_points duration: {:?}", function_start.elapsed());
    Ok(points)
}

/// Collects or imports the points, applies the hostname override and writes
/// the batch with already validated settings.
pub async fn run_with_provider<P>(
    args: &Args,
    settings: &InfluxSettings,
    provider: &P,
) -> Result<(), Error>
where
    P: SpeedTestProvider + ?Sized,
{
    let hostname = local_hostname()?;

    let mut points = match &args.import_csv {
        Some(path) => import_points(path, &hostname, args.skip)?,
        None => vec![collect(provider, &hostname).await?],
    };

    let overrides = TagOverrides::with_hostname(args.hostname.clone());
    if !overrides.is_empty() {
        apply_overrides(&mut points, &overrides);
        info!("Applied tag overrides {:?} to {} points", overrides, points.len());
    }
    write_points(points, settings).await?;
    Ok(())
}

/// Runs one invocation: the config is checked before any measurement or
/// import starts.
pub async fn run(args: &Args) -> Result<(), Error> {
    let settings = load_settings(&args.config)?;
    let provider = HttpSpeedTest::new()?;
    run_with_provider(args, &settings, &provider).await
}
