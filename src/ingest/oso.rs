/// NWS OSO product reader
///
/// Forecast offices publish the official high and low so far for selected
/// stations in short OSO text products, which are dropped into a local
/// directory, one file per product:
///
/// ```text
/// SA 01021430
/// SFOOSOSFD
/// HI 65
/// LO 45
/// ```
///
/// `SA` carries the issue time as `MMDDHHMM` UTC, the year being implied by
/// the time of reading. `HI` and `LO` are °F for the climate day so far.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use thiserror::Error;

use crate::analysis::daily::plausible_temp_f;

/// A product older than this no longer describes the day's extremes.
pub const MAX_PRODUCT_AGE_MINUTES: i64 = 120;

#[derive(Debug, Error)]
pub enum OsoError {
    #[error("Failed to read OSO product '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("OSO product has no SA issue time")]
    MissingIssueTime,

    #[error("OSO product is missing a usable HI or LO line")]
    MissingExtremes,

    #[error("OSO product issued {issued} is {age_minutes} minutes old")]
    Stale {
        issued: DateTime<Utc>,
        age_minutes: i64,
    },
}

impl OsoError {
    /// True when the product file simply is not there (yet).
    pub fn is_not_found(&self) -> bool {
        matches!(self, OsoError::Read(_, e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// The extremes one product reported, with its issue time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsoReport {
    pub issued: DateTime<Utc>,
    pub high_f: f64,
    pub low_f: f64,
}

/// Parses a product's text; `now` supplies the year of the issue time.
/// The first usable `SA`, `HI` and `LO` lines win.
pub fn parse_product(text: &str, now: DateTime<Utc>) -> Result<OsoReport, OsoError> {
    let mut issued = None;
    let mut high_f = None;
    let mut low_f = None;

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(tag), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match tag {
            "SA" => issued = issued.or_else(|| issue_time(value, now)),
            "HI" => high_f = high_f.or_else(|| temperature(value)),
            "LO" => low_f = low_f.or_else(|| temperature(value)),
            _ => {}
        }
    }

    let issued = issued.ok_or(OsoError::MissingIssueTime)?;
    match (high_f, low_f) {
        (Some(high_f), Some(low_f)) => Ok(OsoReport {
            issued,
            high_f,
            low_f,
        }),
        _ => Err(OsoError::MissingExtremes),
    }
}

/// Reads `dir/product` and rejects it when it is too old to trust.
pub fn read_product(dir: &Path, product: &str, now: DateTime<Utc>) -> Result<OsoReport, OsoError> {
    let path = dir.join(product);
    let text = fs::read_to_string(&path).map_err(|e| OsoError::Read(path.clone(), e))?;
    let report = parse_product(&text, now)?;

    let age = now - report.issued;
    if age > Duration::minutes(MAX_PRODUCT_AGE_MINUTES) {
        return Err(OsoError::Stale {
            issued: report.issued,
            age_minutes: age.num_minutes(),
        });
    }
    Ok(report)
}

fn temperature(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().and_then(plausible_temp_f)
}

/// `MMDDHHMM` in the year of `now`, or in the previous year when that would
/// put the issue time more than a day ahead (a December product read in
/// January).
fn issue_time(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |from: usize| raw[from..from + 2].parse::<u32>().ok();
    let (month, day, hour, minute) = (field(0)?, field(2)?, field(4)?, field(6)?);

    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, minute, 0)
            .map(|naive| naive.and_utc())
    };
    match in_year(now.year()) {
        Some(at) if at <= now + Duration::days(1) => Some(at),
        _ => in_year(now.year() - 1),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
