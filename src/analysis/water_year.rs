/// Water-year accumulation and percent-of-normal.
///
/// Precipitation is accounted from a fixed calendar anchor (October 1 by
/// default). The station-derived total computed here is independent of the
/// normals source's own total, so the two can be cross-checked.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

use crate::analysis::climate_day::local_midnight_utc;
use crate::model::{MISSING_SENTINEL, TimeseriesSample};

/// Calendar date on which the water year starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaterYearAnchor {
    pub month: u32,
    pub day: u32,
}

impl Default for WaterYearAnchor {
    fn default() -> Self {
        WaterYearAnchor { month: 10, day: 1 }
    }
}

impl WaterYearAnchor {
    /// The anchor date in `year`; Feb 29 becomes Feb 28 outside leap years.
    fn date_in(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day).or_else(|| {
            if self.month == 2 && self.day == 29 {
                NaiveDate::from_ymd_opt(year, 2, 28)
            } else {
                None
            }
        })
    }

    /// The most recent anchor date on or before `today`.
    pub fn start_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        let this_year = self.date_in(today.year())?;
        if this_year <= today {
            Some(this_year)
        } else {
            self.date_in(today.year() - 1)
        }
    }
}

/// UTC instant at which the current water year started, taking the anchor
/// at local midnight (UTC midnight when the offset is unknown).
pub fn water_year_start(
    now: DateTime<Utc>,
    offset: Option<FixedOffset>,
    anchor: WaterYearAnchor,
) -> Option<DateTime<Utc>> {
    let offset = match offset {
        Some(o) => o,
        None => FixedOffset::east_opt(0)?,
    };
    let today = now.with_timezone(&offset).date_naive();
    let date = anchor.start_date(today)?;
    Some(local_midnight_utc(date, offset))
}

// ---------------------------------------------------------------------------
// Accumulated counters
// ---------------------------------------------------------------------------

/// Turns raw accumulated-gauge readings into a monotonic total.
///
/// The first reading maps to zero. Positive deltas accumulate; a negative
/// delta is a gauge reset and contributes nothing, the next delta being
/// measured from the post-reset reading. Missing readings stay missing.
pub fn unwrap_cumulative(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut unwrapped = Vec::with_capacity(values.len());
    let mut total = 0.0;
    let mut previous: Option<f64> = None;

    for value in values {
        match value.filter(|v| v.is_finite()) {
            None => unwrapped.push(None),
            Some(v) => {
                if let Some(prev) = previous {
                    let delta = v - prev;
                    if delta > 0.0 {
                        total += delta;
                    }
                }
                previous = Some(v);
                unwrapped.push(Some(total));
            }
        }
    }

    unwrapped
}

/// Precipitation accumulated by the station's own gauge between `start` and
/// `until` (inclusive; `None` means through the last sample).
pub fn station_water_year_in(
    timeseries: &[TimeseriesSample],
    start: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> Option<f64> {
    let readings: Vec<Option<f64>> = timeseries
        .iter()
        .filter(|s| s.timestamp >= start && until.is_none_or(|u| s.timestamp <= u))
        .map(|s| s.precip_in)
        .collect();

    unwrap_cumulative(&readings).into_iter().rev().flatten().next()
}

// ---------------------------------------------------------------------------
// Percent of normal
// ---------------------------------------------------------------------------

/// `round(100 × water_year / normal)`; `None` when either input is missing or
/// the normal is not a positive number. Not clamped, but a magnitude that
/// would print as the missing-value sentinel (or beyond) is reported as
/// missing.
pub fn percent_of_normal(water_year_in: Option<f64>, normal_in: Option<f64>) -> Option<i64> {
    let water_year = water_year_in.filter(|v| v.is_finite())?;
    let normal = normal_in.filter(|n| n.is_finite() && *n > 0.0)?;
    let percent = (100.0 * water_year / normal).round();
    (percent.abs() < MISSING_SENTINEL as f64).then_some(percent as i64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
