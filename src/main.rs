//! Station Payload Builder
//!
//! One run of the payload service:
//! 1. Loads the station registry (stations.toml)
//! 2. Fetches recent observations from Synoptic for every configured station
//! 3. Resolves water-year totals and normals from ACIS, with fallbacks
//! 4. Folds the local OSO products into the official-extremes caches
//! 5. Shapes one record per station and writes the JSON document,
//!    rebuilding the previous climate day's document when the day rolls over
//!
//! Usage:
//!   cargo run --release
//!   cargo run --release -- --config stations.toml --output out/payloads.json
//!   cargo run --release -- --as-of 2024-01-02T20:00:00Z --log-level debug
//!
//! Environment:
//!   SYNOPTIC_KEY - Synoptic Data API token (may be set in .env)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Offset, Utc};
use clap::Parser;
use tracing::info;

use station_payloads::analysis::climate_day::offset_from_hours;
use station_payloads::analysis::water_year::water_year_start;
use station_payloads::config::{DEFAULT_CONFIG_PATH, load_registry};
use station_payloads::ingest::acis::{AcisClient, AcisNormals};
use station_payloads::ingest::synoptic::{SynopticClient, fetch_observations};
use station_payloads::{logging, oso_cache, pipeline};

#[derive(Parser, Debug)]
#[command(name = "build_station_payloads")]
#[command(about = "Build the per-station weather payload document")]
struct Args {
    /// Station registry file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Output file (overrides the registry's output_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Build as of this RFC 3339 instant instead of now
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let registry = load_registry(&args.config)
        .with_context(|| format!("loading station registry {}", args.config.display()))?;
    let settings = &registry.settings;
    let now = args.as_of.unwrap_or_else(Utc::now);
    info!(stations = registry.stations.len(), as_of = %now, "building station payloads");

    let synoptic = SynopticClient::from_env().context("creating Synoptic client")?;
    let observations =
        fetch_observations(&synoptic, &registry, now).context("fetching observations")?;

    let offset = settings
        .utc_offset_hours
        .and_then(offset_from_hours)
        .unwrap_or_else(|| Utc.fix());
    let wy_start = water_year_start(now, Some(offset), settings.water_year_anchor)
        .context("computing water-year start")?;
    let acis = AcisClient::new().context("creating ACIS client")?;
    let normals = pipeline::collect_normals(
        &registry,
        Arc::new(AcisNormals::for_water_year(acis, wy_start, now, offset)),
    );

    let official = oso_cache::refresh(&registry, &observations, now);

    let output_path = args.output.unwrap_or_else(|| settings.output_path.clone());
    let published =
        pipeline::publish(&registry, &observations, &normals, &official, now, &output_path)
            .with_context(|| format!("writing {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        stations = published.today.data.len(),
        climate_day = %published.today.meta.climate_day_label,
        yesterday_rebuilt = published.yesterday.is_some(),
        "payload document written"
    );
    Ok(())
}
