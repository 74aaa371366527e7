/// Core data types for the station payload service.
///
/// This module defines the shared domain model imported by all other modules:
/// the typed upstream records (observations and normals) produced by the
/// ingest layer, and the output record consumed by the dashboard. It contains
/// no I/O and almost no logic: only types and their small accessors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Output contract constants
// ---------------------------------------------------------------------------

/// Value written to the output file in place of any numeric field that could
/// not be computed. Part of the public contract: the dashboard keys off this
/// literal, so it must never change without a version bump.
pub const MISSING_SENTINEL: i64 = 9999;

// ---------------------------------------------------------------------------
// Recent-observations source
// ---------------------------------------------------------------------------

/// Descriptive metadata for a station, as reported by the observations source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationMeta {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_ft: Option<f64>,
}

/// The most recent instantaneous temperature report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
    pub value_f: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One air temperature sample from the recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempSample {
    pub timestamp: DateTime<Utc>,
    pub temp_f: Option<f64>,
}

/// Rolling high/low reported by the station itself (ASOS 6-hour extrema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedExtrema {
    pub timestamp: DateTime<Utc>,
    pub max_f: Option<f64>,
    pub min_f: Option<f64>,
}

/// Precipitation that fell during the hour ending at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecipIncrement {
    pub timestamp: DateTime<Utc>,
    pub amount_in: Option<f64>,
}

/// One sample of the long (water-year) timeseries.
///
/// `precip_in` is the gauge's accumulated counter, not an increment; it may
/// reset to zero when the gauge is serviced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesSample {
    pub timestamp: DateTime<Utc>,
    pub temp_f: Option<f64>,
    pub precip_in: Option<f64>,
}

/// Everything the observations source returned for one station.
///
/// Every vector is ordered by timestamp (oldest first) as delivered by the
/// source; an empty vector means the station did not report that product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    pub stid: String,
    pub meta: StationMeta,
    pub latest: Option<LatestReading>,
    pub recent_temps: Vec<TempSample>,
    pub reported_extrema: Vec<ReportedExtrema>,
    pub hourly_precip: Vec<PrecipIncrement>,
    pub timeseries: Vec<TimeseriesSample>,
}

impl ObservationSet {
    /// An empty set for a station the source knows nothing about.
    pub fn empty(stid: &str) -> Self {
        ObservationSet {
            stid: stid.to_string(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Normals source
// ---------------------------------------------------------------------------

/// A single value from the normals source, which explicitly distinguishes
/// "no data" from zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Value(f64),
    Unavailable,
}

impl Measure {
    /// Returns the value when present and finite.
    pub fn value(self) -> Option<f64> {
        match self {
            Measure::Value(v) if v.is_finite() => Some(v),
            _ => None,
        }
    }

    pub fn is_available(self) -> bool {
        self.value().is_some()
    }
}

impl From<Option<f64>> for Measure {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Measure::Value(v),
            _ => Measure::Unavailable,
        }
    }
}

/// Water-year-to-date precipitation and its long-term normal for one station id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalsResult {
    pub water_year_in: Measure,
    pub water_year_norm_in: Measure,
}

impl NormalsResult {
    pub fn new(water_year_in: f64, water_year_norm_in: f64) -> Self {
        NormalsResult {
            water_year_in: Measure::Value(water_year_in),
            water_year_norm_in: Measure::Value(water_year_norm_in),
        }
    }

    pub fn unavailable() -> Self {
        NormalsResult {
            water_year_in: Measure::Unavailable,
            water_year_norm_in: Measure::Unavailable,
        }
    }

    /// Both values present: the result can be used without consulting a fallback.
    pub fn is_complete(&self) -> bool {
        self.water_year_in.is_available() && self.water_year_norm_in.is_available()
    }

    pub fn is_empty(&self) -> bool {
        !self.water_year_in.is_available() && !self.water_year_norm_in.is_available()
    }
}

/// Which station id the normals values finally came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "stid", rename_all = "snake_case")]
pub enum NormalsOrigin {
    Primary,
    Fallback(String),
    Unavailable,
}

/// Normals after the fallback protocol has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNormals {
    pub water_year_in: Option<f64>,
    pub water_year_norm_in: Option<f64>,
    pub origin: NormalsOrigin,
}

impl ResolvedNormals {
    pub fn unavailable() -> Self {
        ResolvedNormals {
            water_year_in: None,
            water_year_norm_in: None,
            origin: NormalsOrigin::Unavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// Official daily extremes
// ---------------------------------------------------------------------------

/// The climate day's official high and low for one station, as accumulated
/// from the NWS OSO products issued during that day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OsoExtremes {
    pub high_f: f64,
    pub low_f: f64,
}

/// Official extremes keyed by station id.
pub type OsoTable = HashMap<String, OsoExtremes>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
