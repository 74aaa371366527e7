/// Station registry loader - parses stations.toml
///
/// Separates the station list, the normals fallback mapping and the run
/// settings from code, so stations can be added or re-pointed at a different
/// normals station without recompiling the service.
///
/// The registry is loaded once per run into an immutable `StationRegistry`
/// and passed explicitly to everything that needs it.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::water_year::WaterYearAnchor;

/// Default location of the registry, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "stations.toml";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read station registry '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse station registry '{0}'")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid station registry: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Registry types
// ---------------------------------------------------------------------------

/// Which upstream station lists a station belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Networks {
    /// Primary-observation member: latest temperature, 6-hour extrema and
    /// hourly precipitation are requested.
    pub asos: bool,
    /// Timeseries-eligible member: the water-year timeseries is requested.
    pub hads: bool,
}

/// One configured station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub stid: String,
    pub networks: Networks,
    /// Station id to query the normals source with when `stid` has no data.
    pub normals_fallback: Option<String>,
    /// Fixed UTC offset (local standard time) overriding the registry default.
    pub utc_offset_hours: Option<f64>,
    /// Display name used when the observations source reports none.
    pub name: Option<String>,
    /// File name of the station's OSO product under `Settings::oso_dir`.
    pub oso_product: Option<String>,
}

impl StationConfig {
    pub fn new(stid: &str) -> Self {
        StationConfig {
            stid: stid.to_string(),
            networks: Networks::default(),
            normals_fallback: None,
            utc_offset_hours: None,
            name: None,
            oso_product: None,
        }
    }
}

/// Run-wide settings from the `[settings]` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub water_year_anchor: WaterYearAnchor,
    /// Default fixed UTC offset; `None` derives the offset from longitude.
    pub utc_offset_hours: Option<f64>,
    pub worker_threads: usize,
    pub output_path: PathBuf,
    pub yesterday_output_path: PathBuf,
    /// Add today's accumulation to the normals source's water-year total,
    /// whose daily data end with yesterday.
    pub add_current_day_to_normals: bool,
    /// Directory the OSO text products are dropped into; `None` disables
    /// official extremes entirely.
    pub oso_dir: Option<PathBuf>,
    pub oso_cache_path: PathBuf,
    pub oso_yesterday_cache_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            water_year_anchor: WaterYearAnchor::default(),
            utc_offset_hours: None,
            worker_threads: 4,
            output_path: PathBuf::from("station_payloads.json"),
            yesterday_output_path: PathBuf::from("station_payloads_yesterday.json"),
            add_current_day_to_normals: false,
            oso_dir: None,
            oso_cache_path: PathBuf::from("oso_cache.json"),
            oso_yesterday_cache_path: PathBuf::from("oso_cache_yesterday.json"),
        }
    }
}

/// The loaded registry: stations in output order plus settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRegistry {
    pub settings: Settings,
    pub stations: Vec<StationConfig>,
}

impl StationRegistry {
    pub fn find(&self, stid: &str) -> Option<&StationConfig> {
        self.stations.iter().find(|s| s.stid == stid)
    }

    /// Station ids that are members of the ASOS list, in order.
    pub fn asos_ids(&self) -> Vec<&str> {
        self.stations
            .iter()
            .filter(|s| s.networks.asos)
            .map(|s| s.stid.as_str())
            .collect()
    }

    /// Station ids that are members of the HADS list, in order.
    pub fn hads_ids(&self) -> Vec<&str> {
        self.stations
            .iter()
            .filter(|s| s.networks.hads)
            .map(|s| s.stid.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// TOML structures
// ---------------------------------------------------------------------------

/// Root configuration structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    settings: SettingsFile,
    stations: StationLists,
    #[serde(default)]
    normals_fallbacks: HashMap<String, String>,
    #[serde(default)]
    utc_offsets: HashMap<String, f64>,
    #[serde(default)]
    names: HashMap<String, String>,
    #[serde(default)]
    oso_products: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    water_year_start_month: Option<u32>,
    water_year_start_day: Option<u32>,
    utc_offset_hours: Option<f64>,
    worker_threads: Option<usize>,
    output_path: Option<PathBuf>,
    yesterday_output_path: Option<PathBuf>,
    add_current_day_to_normals: Option<bool>,
    oso_dir: Option<PathBuf>,
    oso_cache_path: Option<PathBuf>,
    oso_yesterday_cache_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct StationLists {
    #[serde(default, rename = "ASOS")]
    asos: Vec<String>,
    #[serde(default, rename = "HADS")]
    hads: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads the station registry from a TOML file.
pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<StationRegistry, ConfigError> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let file: RegistryFile =
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    build_registry(file)
}

/// Parses a registry from TOML text (no file involved).
pub fn parse_registry(contents: &str) -> Result<StationRegistry, ConfigError> {
    let file: RegistryFile = toml::from_str(contents)
        .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
    build_registry(file)
}

fn build_registry(file: RegistryFile) -> Result<StationRegistry, ConfigError> {
    let settings = build_settings(file.settings)?;
    let fallbacks = normals_fallbacks(file.normals_fallbacks);

    // ASOS order first, then HADS-only stations in HADS order.
    let mut stations: Vec<StationConfig> = Vec::new();
    for (ids, is_asos) in [(&file.stations.asos, true), (&file.stations.hads, false)] {
        for raw in ids {
            let stid = raw.trim();
            if stid.is_empty() {
                continue;
            }
            let index = match stations.iter().position(|s| s.stid == stid) {
                Some(i) => i,
                None => {
                    stations.push(StationConfig::new(stid));
                    stations.len() - 1
                }
            };
            let networks = &mut stations[index].networks;
            if is_asos {
                networks.asos = true;
            } else {
                networks.hads = true;
            }
        }
    }

    if stations.is_empty() {
        return Err(ConfigError::Invalid(
            "no stations listed under [stations] ASOS or HADS".to_string(),
        ));
    }

    for station in &mut stations {
        station.normals_fallback = fallbacks.get(&station.stid).cloned();
        station.utc_offset_hours = file.utc_offsets.get(&station.stid).copied();
        station.name = file
            .names
            .get(&station.stid)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        station.oso_product = file
            .oso_products
            .get(&station.stid)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
    }

    Ok(StationRegistry { settings, stations })
}

fn build_settings(file: SettingsFile) -> Result<Settings, ConfigError> {
    let defaults = Settings::default();
    let default_anchor = defaults.water_year_anchor;

    let anchor = WaterYearAnchor {
        month: file.water_year_start_month.unwrap_or(default_anchor.month),
        day: file.water_year_start_day.unwrap_or(default_anchor.day),
    };
    // 2000 is a leap year, so Feb 29 is accepted here and clamped at use.
    if NaiveDate::from_ymd_opt(2000, anchor.month, anchor.day).is_none() {
        return Err(ConfigError::Invalid(format!(
            "water year start {:02}-{:02} is not a calendar date",
            anchor.month, anchor.day
        )));
    }

    let worker_threads = file.worker_threads.unwrap_or(defaults.worker_threads);
    if worker_threads == 0 {
        return Err(ConfigError::Invalid("worker_threads must be at least 1".to_string()));
    }

    Ok(Settings {
        water_year_anchor: anchor,
        utc_offset_hours: file.utc_offset_hours,
        worker_threads,
        output_path: file.output_path.unwrap_or(defaults.output_path),
        yesterday_output_path: file
            .yesterday_output_path
            .unwrap_or(defaults.yesterday_output_path),
        add_current_day_to_normals: file
            .add_current_day_to_normals
            .unwrap_or(defaults.add_current_day_to_normals),
        oso_dir: file.oso_dir,
        oso_cache_path: file.oso_cache_path.unwrap_or(defaults.oso_cache_path),
        oso_yesterday_cache_path: file
            .oso_yesterday_cache_path
            .unwrap_or(defaults.oso_yesterday_cache_path),
    })
}

/// Drops fallback entries with an empty primary or fallback id.
fn normals_fallbacks(raw: HashMap<String, String>) -> HashMap<String, String> {
    raw.into_iter()
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
