/// Upstream data clients.
///
/// Each upstream service gets its own file: URL/request construction, the
/// serde structures for its response envelope, and parsing into the typed
/// records of `crate::model`. Raw JSON never leaves this module.
///
/// - `synoptic` — recent observations (latest, hourly precipitation, timeseries)
/// - `acis`     — water-year precipitation totals and normals
/// - `oso`      — official daily high/low from local NWS OSO text products
/// - `fixtures` (test only) — representative API response payloads

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

pub mod acis;
pub mod oso;
pub mod synoptic;

#[cfg(test)]
pub(crate) mod fixtures;

/// Seconds before an upstream request is abandoned.
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching from an upstream service.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Synoptic API key is missing; set the SYNOPTIC_KEY environment variable")]
    MissingApiKey,

    #[error("Failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("Network request to {0} failed")]
    Network(String, #[source] reqwest::Error),

    #[error("HTTP error {status} from {endpoint}: {body}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        message: String,
    },

    #[error("Failed to parse {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },
}

pub(crate) fn http_client() -> Result<reqwest::blocking::Client, SourceError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(SourceError::Client)
}

/// Sends a prepared request and returns the body of a 2xx response.
pub(crate) fn send(
    request: reqwest::blocking::RequestBuilder,
    endpoint: &str,
) -> Result<String, SourceError> {
    let response = request
        .send()
        .map_err(|e| SourceError::Network(endpoint.to_string(), e.without_url()))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|e| SourceError::Network(endpoint.to_string(), e.without_url()))?;

    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: if body.is_empty() { "no response body".to_string() } else { body },
        });
    }

    Ok(body)
}

// ---------------------------------------------------------------------------
// Lenient field coercion
// ---------------------------------------------------------------------------

/// Reads a number that upstream may send as a JSON number or a numeric string.
pub fn number_from(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

/// Parses an upstream timestamp. Offsets are honored; naive timestamps are
/// taken as UTC. Anything else is `None` and the data point is dropped.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
