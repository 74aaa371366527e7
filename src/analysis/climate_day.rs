/// Local-midnight windowing.
///
/// The daily fields of a payload describe one *climate day*: the 24 hours
/// starting at local midnight, using the station's fixed standard-time
/// offset (no daylight saving, per climate-day convention). This module
/// resolves that offset and turns "now" into the UTC window the daily
/// aggregations filter against.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::config::{Settings, StationConfig};
use crate::model::StationMeta;

/// Real-world UTC offsets span UTC-12 to UTC+14.
const MIN_OFFSET_HOURS: f64 = -12.0;
const MAX_OFFSET_HOURS: f64 = 14.0;

// ---------------------------------------------------------------------------
// Offset resolution
// ---------------------------------------------------------------------------

/// Converts an hour offset (fractions allowed, e.g. 5.5) into a `FixedOffset`.
pub fn offset_from_hours(hours: f64) -> Option<FixedOffset> {
    if !hours.is_finite() || !(MIN_OFFSET_HOURS..=MAX_OFFSET_HOURS).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

/// Nautical time zone for a longitude: one hour per 15 degrees.
pub fn offset_from_longitude(longitude: f64) -> Option<FixedOffset> {
    if !longitude.is_finite() || longitude.abs() > 180.0 {
        return None;
    }
    offset_from_hours((longitude / 15.0).round())
}

/// Resolves the offset for a station: station override, then the registry
/// default, then the station's longitude.
///
/// A configured but invalid offset does not fall through to the next
/// source; the station's timezone is then unresolved and its daily fields
/// degrade to the sentinel.
pub fn resolve_offset(
    station: &StationConfig,
    settings: &Settings,
    meta: &StationMeta,
) -> Option<FixedOffset> {
    if let Some(hours) = station.utc_offset_hours.or(settings.utc_offset_hours) {
        return offset_from_hours(hours);
    }
    meta.longitude.and_then(offset_from_longitude)
}

/// UTC instant of local midnight starting `date` at `offset`.
pub fn local_midnight_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
}

// ---------------------------------------------------------------------------
// Climate day
// ---------------------------------------------------------------------------

/// A local day expressed as a half-open UTC window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateDay {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub date: NaiveDate,
}

impl ClimateDay {
    /// The climate day containing `now`, or `days_ago` days before it.
    pub fn containing(now: DateTime<Utc>, offset: FixedOffset, days_ago: u32) -> Self {
        let today = now.with_timezone(&offset).date_naive();
        let date = today - Duration::days(i64::from(days_ago));
        let start = local_midnight_utc(date, offset);
        ClimateDay {
            start,
            end: start + Duration::days(1),
            date,
        }
    }

    /// True for instants at or after local midnight and before the next one.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Local date as `YYYY-MM-DD`.
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn pacific() -> FixedOffset {
        offset_from_hours(-8.0).unwrap()
    }

    #[test]
    fn test_climate_day_starts_at_local_midnight() {
        let day = ClimateDay::containing(utc(2024, 1, 2, 12, 0), pacific(), 0);
        assert_eq!(day.start, utc(2024, 1, 2, 8, 0));
        assert_eq!(day.end, utc(2024, 1, 3, 8, 0));
        assert_eq!(day.label(), "2024-01-02");
    }

    #[test]
    fn test_before_local_midnight_belongs_to_previous_day() {
        let day = ClimateDay::containing(utc(2024, 1, 2, 6, 0), pacific(), 0);
        assert_eq!(day.start, utc(2024, 1, 1, 8, 0));
        assert_eq!(day.label(), "2024-01-01");
    }

    #[test]
    fn test_days_ago_selects_earlier_day() {
        let day = ClimateDay::containing(utc(2024, 1, 3, 12, 0), pacific(), 1);
        assert_eq!(day.start, utc(2024, 1, 2, 8, 0));
        assert_eq!(day.end, utc(2024, 1, 3, 8, 0));
    }

    #[test]
    fn test_window_boundaries() {
        let day = ClimateDay::containing(utc(2024, 1, 2, 12, 0), pacific(), 0);
        // 23:59 local the previous evening
        assert!(!day.contains(utc(2024, 1, 2, 7, 59)));
        // 00:00 local
        assert!(day.contains(utc(2024, 1, 2, 8, 0)));
        // next local midnight belongs to the next day
        assert!(!day.contains(utc(2024, 1, 3, 8, 0)));
    }

    #[test]
    fn test_offset_from_longitude() {
        assert_eq!(offset_from_longitude(-122.4), offset_from_hours(-8.0));
        assert_eq!(offset_from_longitude(0.0), offset_from_hours(0.0));
        assert_eq!(offset_from_longitude(180.0), offset_from_hours(12.0));
        assert_eq!(offset_from_longitude(200.0), None);
        assert_eq!(offset_from_longitude(f64::NAN), None);
    }

    #[test]
    fn test_offset_from_hours_rejects_out_of_range() {
        assert!(offset_from_hours(14.0).is_some());
        assert!(offset_from_hours(5.5).is_some());
        assert!(offset_from_hours(-13.0).is_none());
        assert!(offset_from_hours(15.0).is_none());
    }

    #[test]
    fn test_resolve_offset_precedence() {
        let mut settings = Settings {
            utc_offset_hours: Some(-8.0),
            ..Settings::default()
        };
        let meta = StationMeta {
            longitude: Some(-75.0),
            ..Default::default()
        };

        let mut station = StationConfig::new("KSFO");
        assert_eq!(resolve_offset(&station, &settings, &meta), offset_from_hours(-8.0));

        station.utc_offset_hours = Some(-7.0);
        assert_eq!(resolve_offset(&station, &settings, &meta), offset_from_hours(-7.0));

        station.utc_offset_hours = None;
        settings.utc_offset_hours = None;
        assert_eq!(resolve_offset(&station, &settings, &meta), offset_from_hours(-5.0));
    }

    #[test]
    fn test_unresolvable_offset() {
        let settings = Settings::default();
        let station = StationConfig::new("NOLOC");
        assert_eq!(resolve_offset(&station, &settings, &StationMeta::default()), None);

        let mut bad = StationConfig::new("BAD");
        bad.utc_offset_hours = Some(99.0);
        let meta = StationMeta {
            longitude: Some(-122.0),
            ..Default::default()
        };
        assert_eq!(resolve_offset(&bad, &settings, &meta), None);
    }
}
