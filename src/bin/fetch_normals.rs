//! Water-Year Normals Lookup
//!
//! Queries ACIS for one station's water-year-to-date precipitation and its
//! normal, applying the registry's fallback station if the primary has no
//! data, and prints the resolved values as JSON.
//!
//! Usage:
//!   cargo run --bin fetch_normals -- SFOC1
//!   cargo run --bin fetch_normals -- KSFO --as-of 2024-01-02T20:00:00Z

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Offset, Utc};
use clap::Parser;

use station_payloads::analysis::climate_day::offset_from_hours;
use station_payloads::analysis::water_year::water_year_start;
use station_payloads::config::{DEFAULT_CONFIG_PATH, Settings, StationConfig, load_registry};
use station_payloads::ingest::acis::{AcisClient, AcisNormals};
use station_payloads::logging;
use station_payloads::model::NormalsOrigin;
use station_payloads::normals::resolve_normals;

#[derive(Parser, Debug)]
#[command(name = "fetch_normals")]
#[command(about = "Print water-year precipitation and normal for one station")]
struct Args {
    /// Station id (registry fallbacks apply when it is configured)
    station: String,

    /// Station registry file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Query as of this RFC 3339 instant instead of now
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let stid = args.station.trim().to_string();
    if stid.is_empty() {
        bail!("station id must not be empty");
    }

    // An unknown station is still queried, just without a fallback.
    let (settings, station) = match load_registry(&args.config) {
        Ok(registry) => {
            let station = registry
                .find(&stid)
                .cloned()
                .unwrap_or_else(|| StationConfig::new(&stid));
            (registry.settings, station)
        }
        Err(e) => {
            tracing::warn!(error = %e, "registry unavailable, querying without fallback");
            (Settings::default(), StationConfig::new(&stid))
        }
    };

    let now = args.as_of.unwrap_or_else(Utc::now);
    let offset = settings
        .utc_offset_hours
        .and_then(offset_from_hours)
        .unwrap_or_else(|| Utc.fix());
    let wy_start = water_year_start(now, Some(offset), settings.water_year_anchor)
        .context("computing water-year start")?;

    let source = AcisNormals::for_water_year(
        AcisClient::new().context("creating ACIS client")?,
        wy_start,
        now,
        offset,
    );
    let resolved = resolve_normals(&station, &source);

    if resolved.origin == NormalsOrigin::Unavailable {
        bail!(
            "no normals available for primary='{}', fallback='{}'",
            station.stid,
            station.normals_fallback.as_deref().unwrap_or("none")
        );
    }

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}
