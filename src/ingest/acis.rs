/// RCC-ACIS StnData client
///
/// Retrieves water-year-to-date precipitation and its 1991-2020 normal for a
/// single station id, as two summary-only `pcpn` elements.
///
/// API Documentation: https://www.rcc-acis.org/docs_webservices.html
///
/// The request is a form POST whose single `params` field carries the JSON
/// query. ACIS values are strings: "M" is missing, "T" is a trace and a
/// trailing letter is a quality flag ("1.23A" = accumulated over several days).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{SourceError, http_client, number_from, send};
use crate::model::{Measure, NormalsResult};
use crate::normals::NormalsLookup;

const ACIS_STN_DATA_URL: &str = "https://data.rcc-acis.org/StnData";
const SERVICE: &str = "ACIS";

// ============================================================================
// ACIS API Response Structures
// ============================================================================

/// The parts of a StnData body this crate reads; station `meta` is ignored.
#[derive(Debug, Deserialize)]
pub struct StnDataResponse {
    #[serde(default)]
    pub smry: Vec<Value>,
    pub error: Option<String>,
}

// ============================================================================
// Request construction
// ============================================================================

/// Builds the StnData query: season-to-date total and its normal.
pub fn build_request_params(sid: &str, start: NaiveDate, end: NaiveDate) -> Value {
    let element = |normal: bool| {
        let mut elem = json!({
            "name": "pcpn",
            "interval": "dly",
            "duration": "dly",
            "smry": { "reduce": "sum" },
            "smry_only": 1,
        });
        if normal {
            elem["normal"] = json!(1);
        }
        elem
    };

    json!({
        "sid": sid,
        "sdate": start.format("%Y-%m-%d").to_string(),
        "edate": end.format("%Y-%m-%d").to_string(),
        "elems": [element(false), element(true)],
    })
}

// ============================================================================
// Response parsing
// ============================================================================

/// Reads one ACIS value. Arrays (value plus flags) use their first element.
pub fn parse_acis_value(value: &Value) -> Measure {
    match value {
        Value::Array(items) => items.first().map(parse_acis_value).unwrap_or(Measure::Unavailable),
        Value::String(raw) => parse_acis_str(raw),
        other => Measure::from(number_from(other)),
    }
}

fn parse_acis_str(raw: &str) -> Measure {
    let raw = raw.trim();
    match raw {
        "" | "M" => Measure::Unavailable,
        "T" => Measure::Value(0.0),
        _ => {
            if let Ok(v) = raw.parse::<f64>() {
                return Measure::from(Some(v));
            }
            // Flagged value: keep the numeric prefix.
            let end = raw
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                .unwrap_or(raw.len());
            Measure::from(raw[..end].parse::<f64>().ok())
        }
    }
}

/// Parses a StnData body into the water-year total and normal.
pub fn parse_stn_data(body: &str) -> Result<NormalsResult, SourceError> {
    let response: StnDataResponse = serde_json::from_str(body).map_err(|e| SourceError::Parse {
        service: SERVICE,
        message: e.to_string(),
    })?;

    if let Some(error) = response.error {
        return Err(SourceError::Api {
            service: SERVICE,
            message: error,
        });
    }

    let measure = |i: usize| {
        response
            .smry
            .get(i)
            .map(parse_acis_value)
            .unwrap_or(Measure::Unavailable)
    };
    Ok(NormalsResult {
        water_year_in: measure(0),
        water_year_norm_in: measure(1),
    })
}

// ============================================================================
// Client
// ============================================================================

pub struct AcisClient {
    http: reqwest::blocking::Client,
    url: String,
}

impl AcisClient {
    pub fn new() -> Result<Self, SourceError> {
        Ok(AcisClient {
            http: http_client()?,
            url: ACIS_STN_DATA_URL.to_string(),
        })
    }

    /// Points the client at another StnData endpoint.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Fetches and parses the totals for one station id.
    pub fn fetch_normals(
        &self,
        sid: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<NormalsResult, SourceError> {
        let params = build_request_params(sid, start, end).to_string();
        debug!(sid = %sid, sdate = %start, edate = %end, "requesting ACIS totals");

        let body = send(
            self.http
                .post(&self.url)
                .header("Accept", "application/json")
                .form(&[("params", params)]),
            &self.url,
        )?;
        parse_stn_data(&body)
    }
}

/// Live normals source over a fixed date range.
///
/// Never fails: any transport or API error is logged and reported as
/// unavailable, which sends the station through the fallback protocol.
pub struct AcisNormals {
    client: AcisClient,
    start: NaiveDate,
    end: NaiveDate,
}

impl AcisNormals {
    pub fn new(client: AcisClient, start: NaiveDate, end: NaiveDate) -> Self {
        AcisNormals { client, start, end }
    }

    /// Range from the water-year start through the local date of `now`.
    pub fn for_water_year(
        client: AcisClient,
        water_year_start: DateTime<Utc>,
        now: DateTime<Utc>,
        offset: chrono::FixedOffset,
    ) -> Self {
        let start = water_year_start.with_timezone(&offset).date_naive();
        let end = now.with_timezone(&offset).date_naive();
        Self::new(client, start, end)
    }
}

impl NormalsLookup for AcisNormals {
    fn lookup(&self, stid: &str) -> NormalsResult {
        match self.client.fetch_normals(stid, self.start, self.end) {
            Ok(result) => result,
            Err(e) => {
                warn!(stid = %stid, error = %e, "ACIS request failed; normals unavailable");
                NormalsResult::unavailable()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
