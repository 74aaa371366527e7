//! Observations Dump
//!
//! Fetches the Synoptic observations for the configured stations and prints
//! the parsed records as JSON, in registry order. Useful for checking what
//! the payload builder will see without writing an output file.
//!
//! Usage:
//!   cargo run --bin fetch_observations
//!   cargo run --bin fetch_observations -- --station KSFO
//!
//! Environment:
//!   SYNOPTIC_KEY - Synoptic Data API token (may be set in .env)

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use station_payloads::config::{DEFAULT_CONFIG_PATH, load_registry};
use station_payloads::ingest::synoptic::{SynopticClient, fetch_observations};
use station_payloads::logging;
use station_payloads::model::ObservationSet;

#[derive(Parser, Debug)]
#[command(name = "fetch_observations")]
#[command(about = "Print parsed Synoptic observations for the configured stations")]
struct Args {
    /// Station registry file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Only print this station
    #[arg(short, long)]
    station: Option<String>,

    /// Fetch as of this RFC 3339 instant instead of now
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let registry = load_registry(&args.config)
        .with_context(|| format!("loading station registry {}", args.config.display()))?;
    let now = args.as_of.unwrap_or_else(Utc::now);

    let client = SynopticClient::from_env().context("creating Synoptic client")?;
    let mut observations =
        fetch_observations(&client, &registry, now).context("fetching observations")?;

    let ordered: Vec<ObservationSet> = registry
        .stations
        .iter()
        .filter(|s| args.station.as_deref().is_none_or(|wanted| wanted == s.stid))
        .map(|s| {
            observations
                .remove(&s.stid)
                .unwrap_or_else(|| ObservationSet::empty(&s.stid))
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&ordered)?);
    Ok(())
}
