/// Synoptic Data API v2 client
///
/// Retrieves recent surface observations for the configured stations:
/// the latest air temperature with the ASOS 6-hour extrema, hourly
/// precipitation intervals, and the water-year timeseries (temperature and
/// the gauge's accumulated precipitation counter).
///
/// API Documentation: https://docs.synopticdata.com/services/weather-data-api
///
/// All requests ask for english units (°F, inches, feet) and UTC timestamps.
/// The API token is read from `SYNOPTIC_KEY` (a `.env` file is honored).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{SourceError, http_client, number_from, parse_timestamp, send};
use crate::analysis::climate_day::offset_from_hours;
use crate::analysis::water_year::water_year_start;
use crate::config::StationRegistry;
use crate::model::{
    LatestReading, ObservationSet, PrecipIncrement, ReportedExtrema, TempSample, TimeseriesSample,
};

const SYNOPTIC_BASE_URL: &str = "https://api.synopticdata.com/v2";
const SERVICE: &str = "Synoptic";

/// Minutes of history requested for the latest-observations query.
pub const RECENT_WINDOW_MINUTES: u32 = 1440;

// ============================================================================
// Synoptic API Response Structures
// ============================================================================

/// Top-level envelope shared by every Synoptic service.
#[derive(Debug, Deserialize)]
pub struct SynopticResponse {
    #[serde(rename = "SUMMARY", default)]
    pub summary: SynopticSummary,
    #[serde(rename = "STATION", default)]
    pub stations: Vec<SynopticStation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SynopticSummary {
    #[serde(rename = "RESPONSE_CODE", default)]
    pub response_code: Value, // number, occasionally a string
    #[serde(rename = "RESPONSE_MESSAGE")]
    pub response_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SynopticStation {
    #[serde(rename = "STID")]
    pub stid: String,
    #[serde(rename = "NAME")]
    pub name: Option<String>,
    #[serde(rename = "ELEVATION", default)]
    pub elevation: Value, // feet, sent as a string
    #[serde(rename = "LATITUDE", default)]
    pub latitude: Value,
    #[serde(rename = "LONGITUDE", default)]
    pub longitude: Value,
    #[serde(rename = "OBSERVATIONS")]
    pub observations: Option<SynopticObservations>,
}

/// Parallel observation arrays, zipped by index against `date_time`.
#[derive(Debug, Default, Deserialize)]
pub struct SynopticObservations {
    #[serde(default)]
    pub date_time: Vec<Value>,
    #[serde(default)]
    pub air_temp_set_1: Vec<Value>,
    #[serde(default)]
    pub air_temp_high_6_hour_set_1: Vec<Value>,
    #[serde(default)]
    pub air_temp_low_6_hour_set_1: Vec<Value>,
    #[serde(default)]
    pub precip_accum_set_1: Vec<Value>,
    #[serde(default)]
    pub precipitation: Vec<PrecipInterval>,
}

/// One interval from the precipitation service (`pmode=intervals`).
#[derive(Debug, Deserialize)]
pub struct PrecipInterval {
    pub first_report: Option<String>,
    pub last_report: Option<String>,
    #[serde(default)]
    pub total: Value,
}

// ============================================================================
// Client
// ============================================================================

pub struct SynopticClient {
    http: reqwest::blocking::Client,
    token: String,
    base_url: String,
}

impl SynopticClient {
    pub fn new(token: &str) -> Result<Self, SourceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SourceError::MissingApiKey);
        }
        Ok(SynopticClient {
            http: http_client()?,
            token: token.to_string(),
            base_url: SYNOPTIC_BASE_URL.to_string(),
        })
    }

    /// Builds a client from `SYNOPTIC_KEY`, loading `.env` first if present.
    pub fn from_env() -> Result<Self, SourceError> {
        dotenv::dotenv().ok();
        let token = std::env::var("SYNOPTIC_KEY").unwrap_or_default();
        Self::new(&token)
    }

    /// Points the client at another host (a mirror or a local stub).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Last 24 h of air temperature plus the 6-hour extrema.
    pub fn fetch_latest(&self, ids: &[&str]) -> Result<String, SourceError> {
        self.get(
            "stations/timeseries",
            &[
                ("stid", ids.join(",")),
                ("vars", "air_temp,air_temp_high_6_hour,air_temp_low_6_hour".to_string()),
                ("recent", RECENT_WINDOW_MINUTES.to_string()),
                ("units", "english".to_string()),
                ("obtimezone", "utc".to_string()),
                ("showemptystations", "1".to_string()),
                ("hfmetars", "0".to_string()),
            ],
        )
    }

    /// Hourly precipitation intervals between `start` and `end`.
    pub fn fetch_hourly_precip(
        &self,
        ids: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, SourceError> {
        self.get(
            "stations/precipitation",
            &[
                ("stid", ids.join(",")),
                ("pmode", "intervals".to_string()),
                ("interval", "hour".to_string()),
                ("start", synoptic_time(start)),
                ("end", synoptic_time(end)),
                ("units", "english".to_string()),
                ("obtimezone", "utc".to_string()),
            ],
        )
    }

    /// Temperature and accumulated precipitation between `start` and `end`.
    pub fn fetch_timeseries(
        &self,
        ids: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<String, SourceError> {
        self.get(
            "stations/timeseries",
            &[
                ("stid", ids.join(",")),
                ("vars", "air_temp,precip_accum".to_string()),
                ("start", synoptic_time(start)),
                ("end", synoptic_time(end)),
                ("units", "english".to_string()),
                ("obtimezone", "utc".to_string()),
                ("showemptystations", "1".to_string()),
            ],
        )
    }

    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        // The token stays out of `endpoint`, which ends up in error messages.
        let endpoint = format!("{}/{}", self.base_url, path);
        let mut query = build_query(params);
        query.push_str("&token=");
        query.push_str(&urlencoding::encode(&self.token));

        debug!(endpoint = %endpoint, "requesting Synoptic data");
        send(
            self.http
                .get(format!("{}?{}", endpoint, query))
                .header("Accept", "application/json"),
            &endpoint,
        )
    }
}

/// Joins query parameters, percent-encoding each value.
pub fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Synoptic's compact UTC time format, `YYYYmmddHHMM`.
pub fn synoptic_time(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M").to_string()
}

// ============================================================================
// Response parsing
// ============================================================================

/// Parses a response body and checks the `SUMMARY` envelope.
pub fn parse_response(body: &str) -> Result<SynopticResponse, SourceError> {
    let response: SynopticResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse {
            service: SERVICE,
            message: e.to_string(),
        })?;

    if number_from(&response.summary.response_code) != Some(1.0) {
        return Err(SourceError::Api {
            service: SERVICE,
            message: response
                .summary
                .response_message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    Ok(response)
}

/// Observation sets keyed by station id.
pub type ObservationMap = HashMap<String, ObservationSet>;

/// Adds a latest-observations response to `sets`.
pub fn merge_latest(sets: &mut ObservationMap, body: &str) -> Result<(), SourceError> {
    for station in parse_response(body)?.stations {
        let obs = station.observations.as_ref();
        let times = obs.map(|o| o.date_time.as_slice()).unwrap_or_default();

        let recent_temps: Vec<TempSample> = obs
            .map(|o| {
                zipped(times, &o.air_temp_set_1)
                    .map(|(timestamp, temp_f)| TempSample { timestamp, temp_f })
                    .collect()
            })
            .unwrap_or_default();

        let reported_extrema: Vec<ReportedExtrema> = obs
            .map(|o| {
                zipped(times, &o.air_temp_high_6_hour_set_1)
                    .zip(zipped(times, &o.air_temp_low_6_hour_set_1))
                    .filter(|((_, max), (_, min))| max.is_some() || min.is_some())
                    .map(|((timestamp, max_f), (_, min_f))| ReportedExtrema {
                        timestamp,
                        max_f,
                        min_f,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let set = entry(sets, &station);
        set.latest = latest_from(&recent_temps).or(set.latest.take());
        set.recent_temps = recent_temps;
        set.reported_extrema = reported_extrema;
    }
    Ok(())
}

/// Adds a precipitation-intervals response to `sets`.
pub fn merge_hourly_precip(sets: &mut ObservationMap, body: &str) -> Result<(), SourceError> {
    for station in parse_response(body)?.stations {
        let hourly_precip: Vec<PrecipIncrement> = station
            .observations
            .as_ref()
            .map(|o| {
                o.precipitation
                    .iter()
                    .filter_map(|interval| {
                        let stamp = interval
                            .last_report
                            .as_deref()
                            .or(interval.first_report.as_deref())?;
                        Some(PrecipIncrement {
                            timestamp: parse_timestamp(stamp)?,
                            amount_in: number_from(&interval.total),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        entry(sets, &station).hourly_precip = hourly_precip;
    }
    Ok(())
}

/// Adds a timeseries response to `sets`. Stations without a latest reading
/// (non-ASOS members) take their most recent timeseries temperature.
pub fn merge_timeseries(sets: &mut ObservationMap, body: &str) -> Result<(), SourceError> {
    for station in parse_response(body)?.stations {
        let timeseries: Vec<TimeseriesSample> = station
            .observations
            .as_ref()
            .map(|o| {
                o.date_time
                    .iter()
                    .enumerate()
                    .filter_map(|(i, raw)| {
                        Some(TimeseriesSample {
                            timestamp: raw.as_str().and_then(parse_timestamp)?,
                            temp_f: o.air_temp_set_1.get(i).and_then(number_from),
                            precip_in: o.precip_accum_set_1.get(i).and_then(number_from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let set = entry(sets, &station);
        if set.latest.is_none() {
            let temps: Vec<TempSample> = timeseries
                .iter()
                .map(|s| TempSample {
                    timestamp: s.timestamp,
                    temp_f: s.temp_f,
                })
                .collect();
            set.latest = latest_from(&temps);
        }
        set.timeseries = timeseries;
    }
    Ok(())
}

/// Pairs each parseable timestamp with the value at the same index.
/// A missing or non-numeric value becomes `None`; a bad timestamp drops the pair.
fn zipped<'a>(
    times: &'a [Value],
    values: &'a [Value],
) -> impl Iterator<Item = (DateTime<Utc>, Option<f64>)> + 'a {
    times.iter().enumerate().filter_map(move |(i, raw)| {
        let timestamp = raw.as_str().and_then(parse_timestamp)?;
        Some((timestamp, values.get(i).and_then(number_from)))
    })
}

/// The newest sample that carries a temperature.
fn latest_from(samples: &[TempSample]) -> Option<LatestReading> {
    samples
        .iter()
        .filter(|s| s.temp_f.is_some())
        .max_by_key(|s| s.timestamp)
        .map(|s| LatestReading {
            value_f: s.temp_f,
            timestamp: s.timestamp,
        })
}

/// Returns the set for `station`, creating it and filling any metadata the
/// set does not have yet.
fn entry<'a>(sets: &'a mut ObservationMap, station: &SynopticStation) -> &'a mut ObservationSet {
    let set = sets
        .entry(station.stid.clone())
        .or_insert_with(|| ObservationSet::empty(&station.stid));

    let meta = &mut set.meta;
    if meta.name.is_none() {
        meta.name = station
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
    }
    meta.latitude = meta.latitude.or_else(|| number_from(&station.latitude));
    meta.longitude = meta.longitude.or_else(|| number_from(&station.longitude));
    meta.elevation_ft = meta.elevation_ft.or_else(|| number_from(&station.elevation));
    set
}

// ============================================================================
// Collection
// ============================================================================

/// Fetches everything the shaping engine needs for the registry's stations.
///
/// ASOS members get the latest/extrema and hourly-precipitation queries;
/// HADS members get the water-year timeseries. Any failed request fails the
/// whole collection: a partial observations picture would silently blank
/// fields that should have had data.
pub fn fetch_observations(
    client: &SynopticClient,
    registry: &StationRegistry,
    now: DateTime<Utc>,
) -> Result<ObservationMap, SourceError> {
    let settings = &registry.settings;
    let offset = settings.utc_offset_hours.and_then(offset_from_hours);
    let window_start = water_year_start(now, offset, settings.water_year_anchor).ok_or_else(|| {
        SourceError::Parse {
            service: SERVICE,
            message: "could not compute the water-year start for the request window".to_string(),
        }
    })?;

    let mut sets = HashMap::new();

    let asos = registry.asos_ids();
    if !asos.is_empty() {
        info!(stations = asos.len(), "fetching latest observations");
        merge_latest(&mut sets, &client.fetch_latest(&asos)?)?;

        info!(stations = asos.len(), "fetching hourly precipitation");
        let precip_start = now - chrono::Duration::hours(48);
        merge_hourly_precip(&mut sets, &client.fetch_hourly_precip(&asos, precip_start, now)?)?;
    }

    let hads = registry.hads_ids();
    if !hads.is_empty() {
        info!(stations = hads.len(), start = %window_start, "fetching water-year timeseries");
        merge_timeseries(&mut sets, &client.fetch_timeseries(&hads, window_start, now)?)?;
    }

    info!(returned = sets.len(), "observations collected");
    Ok(sets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
