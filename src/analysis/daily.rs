/// Daily extrema and precipitation since local midnight.
///
/// Both aggregations only look at data inside a `ClimateDay` window. Bad
/// data points (non-finite or implausible temperatures, negative or
/// implausible precipitation increments) never abort the computation; they
/// are dropped or counted as zero.

use chrono::{DateTime, Duration, Utc};

use crate::analysis::climate_day::ClimateDay;
use crate::analysis::water_year::unwrap_cumulative;
use crate::model::{ObservationSet, PrecipIncrement, TimeseriesSample};

/// Largest hourly increment accepted as real precipitation, in inches.
pub const MAX_PLAUSIBLE_HOURLY_IN: f64 = 12.0;

/// Temperatures beyond ±200 °F are sensor garbage, not weather.
pub const MAX_PLAUSIBLE_TEMP_F: f64 = 200.0;

/// Accumulated-gauge readings this long after the window closes still count
/// toward that day (late top-of-hour reports).
pub const REPORTING_GRACE_MINUTES: i64 = 30;

// ---------------------------------------------------------------------------
// Temperature extrema
// ---------------------------------------------------------------------------

/// The reading when it is finite and within the plausible range.
pub fn plausible_temp_f(value_f: f64) -> Option<f64> {
    (value_f.is_finite() && value_f.abs() <= MAX_PLAUSIBLE_TEMP_F).then_some(value_f)
}

/// A temperature together with the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempExtreme {
    pub value_f: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyTempRange {
    pub max: Option<TempExtreme>,
    pub min: Option<TempExtreme>,
}

impl DailyTempRange {
    fn offer_max(&mut self, value_f: f64, at: DateTime<Utc>) {
        let replace = match self.max {
            None => true,
            Some(cur) => value_f > cur.value_f || (value_f == cur.value_f && at < cur.at),
        };
        if replace {
            self.max = Some(TempExtreme { value_f, at });
        }
    }

    fn offer_min(&mut self, value_f: f64, at: DateTime<Utc>) {
        let replace = match self.min {
            None => true,
            Some(cur) => value_f < cur.value_f || (value_f == cur.value_f && at < cur.at),
        };
        if replace {
            self.min = Some(TempExtreme { value_f, at });
        }
    }
}

/// Highest and lowest temperature observed in the window.
///
/// Candidates are the recent temperature samples, the timeseries
/// temperatures, and the station's own rolling high/low reports. When two
/// candidates tie, the earliest one is kept regardless of input order.
pub fn daily_temp_range(obs: &ObservationSet, day: &ClimateDay) -> DailyTempRange {
    let mut range = DailyTempRange::default();

    let candidates = obs
        .recent_temps
        .iter()
        .map(|s| (s.timestamp, s.temp_f, s.temp_f))
        .chain(obs.timeseries.iter().map(|s| (s.timestamp, s.temp_f, s.temp_f)))
        .chain(obs.reported_extrema.iter().map(|e| (e.timestamp, e.max_f, e.min_f)));

    for (at, high, low) in candidates {
        if !day.contains(at) {
            continue;
        }
        if let Some(v) = high.and_then(plausible_temp_f) {
            range.offer_max(v, at);
        }
        if let Some(v) = low.and_then(plausible_temp_f) {
            range.offer_min(v, at);
        }
    }

    range
}

// ---------------------------------------------------------------------------
// Precipitation
// ---------------------------------------------------------------------------

/// Precipitation since local midnight.
///
/// Hourly increments are preferred; stations without any in the window fall
/// back to differencing their accumulated gauge counter.
pub fn daily_precip(obs: &ObservationSet, day: &ClimateDay) -> Option<f64> {
    hourly_precip_total(&obs.hourly_precip, day)
        .or_else(|| precip_from_counter(&obs.timeseries, day))
}

/// An increment as it should be summed: sensor resets and garbage count as zero.
fn sanitize_increment(amount_in: f64) -> f64 {
    if amount_in.is_finite() && (0.0..=MAX_PLAUSIBLE_HOURLY_IN).contains(&amount_in) {
        amount_in
    } else {
        0.0
    }
}

/// Sum of the hourly increments in the window; `None` if the window holds no
/// reported increment at all.
pub fn hourly_precip_total(increments: &[PrecipIncrement], day: &ClimateDay) -> Option<f64> {
    let mut total: Option<f64> = None;
    for increment in increments.iter().filter(|i| day.contains(i.timestamp)) {
        if let Some(amount) = increment.amount_in {
            *total.get_or_insert(0.0) += sanitize_increment(amount);
        }
    }
    total
}

/// Daily total from an accumulated counter: last reading at or before the
/// end of the window (plus grace) minus the last reading before it opened.
/// Without a pre-window reading the first in-window reading is the baseline.
pub fn precip_from_counter(samples: &[TimeseriesSample], day: &ClimateDay) -> Option<f64> {
    let readings: Vec<Option<f64>> = samples.iter().map(|s| s.precip_in).collect();
    let unwrapped = unwrap_cumulative(&readings);
    let close = day.end + Duration::minutes(REPORTING_GRACE_MINUTES);

    let mut before: Option<f64> = None;
    let mut first_inside: Option<f64> = None;
    let mut last_inside: Option<f64> = None;

    for (sample, total) in samples.iter().zip(unwrapped) {
        let Some(total) = total else { continue };
        if sample.timestamp < day.start {
            before = Some(total);
        } else if sample.timestamp <= close {
            first_inside.get_or_insert(total);
            last_inside = Some(total);
        }
    }

    let baseline = before.or(first_inside)?;
    Some(last_inside? - baseline)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
