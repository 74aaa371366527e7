/// Record assembly: one `StationPayload` per configured station.
///
/// `shape_station` is a pure function of the station's configuration, its
/// observations and its resolved normals. Every field is computed on its
/// own; a missing input degrades only the fields that depend on it.
///
/// Missing values are carried as `None` all the way to serialization, where
/// they are written as the `MISSING_SENTINEL` literal. Nothing in this crate
/// ever does arithmetic on the sentinel.

use chrono::{DateTime, Offset, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::analysis::climate_day::{ClimateDay, offset_from_hours, resolve_offset};
use crate::analysis::daily::{daily_precip, daily_temp_range, plausible_temp_f};
use crate::analysis::water_year::{percent_of_normal, station_water_year_in, water_year_start};
use crate::config::{Settings, StationConfig};
use crate::model::{ObservationSet, OsoTable, ResolvedNormals};

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// The public per-station record. Field names are part of the output contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationPayload {
    pub stid: String,
    pub name: String,
    #[serde(serialize_with = "sentinel::float")]
    pub latitude: Option<f64>,
    #[serde(serialize_with = "sentinel::float")]
    pub longitude: Option<f64>,
    /// Feet above mean sea level.
    #[serde(serialize_with = "sentinel::float")]
    pub elevation: Option<f64>,
    /// Time of the latest observation, RFC 3339 UTC.
    pub date_time: Option<String>,
    #[serde(serialize_with = "sentinel::int")]
    pub air_temp_f: Option<i64>,
    #[serde(serialize_with = "sentinel::int")]
    pub daily_max_f: Option<i64>,
    #[serde(serialize_with = "sentinel::int")]
    pub daily_min_f: Option<i64>,
    #[serde(rename = "dailyAccumIN", serialize_with = "sentinel::float")]
    pub daily_accum_in: Option<f64>,
    #[serde(rename = "waterYearIN", serialize_with = "sentinel::float")]
    pub water_year_in: Option<f64>,
    #[serde(rename = "waterYearNormIN", serialize_with = "sentinel::float")]
    pub water_year_norm_in: Option<f64>,
    #[serde(serialize_with = "sentinel::int")]
    pub percent_of_norm: Option<i64>,
}

/// Describes the climate day a document was built for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub generated_at: String,
    pub climate_day_start: String,
    pub climate_day_end: String,
    pub climate_day_label: String,
}

impl PayloadMeta {
    pub fn new(generated_at: DateTime<Utc>, day: &ClimateDay) -> Self {
        PayloadMeta {
            generated_at: generated_at.to_rfc3339(),
            climate_day_start: day.start.to_rfc3339(),
            climate_day_end: day.end.to_rfc3339(),
            climate_day_label: day.label(),
        }
    }
}

/// The output file: `{ "meta": {...}, "data": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadDocument {
    pub meta: PayloadMeta,
    pub data: Vec<StationPayload>,
}

/// Writes `None` and non-finite numbers as the sentinel.
mod sentinel {
    use serde::Serializer;

    use crate::model::MISSING_SENTINEL;

    pub fn int<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.unwrap_or(MISSING_SENTINEL))
    }

    pub fn float<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value.filter(|v| v.is_finite()) {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_i64(MISSING_SENTINEL),
        }
    }
}

// ---------------------------------------------------------------------------
// Rounding at the output boundary
// ---------------------------------------------------------------------------

/// Whole degrees, half away from zero. Implausible readings are missing.
fn whole_degrees(value_f: f64) -> Option<i64> {
    plausible_temp_f(value_f).map(|v| v.round() as i64)
}

/// Hundredths of an inch.
fn hundredths(value_in: f64) -> Option<f64> {
    value_in.is_finite().then(|| (value_in * 100.0).round() / 100.0)
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Run-wide inputs shared by every station.
#[derive(Debug, Clone, Copy)]
pub struct ShapingContext<'a> {
    pub now: DateTime<Utc>,
    pub settings: &'a Settings,
    /// 0 for the current climate day, 1 for yesterday, ...
    pub days_ago: u32,
    /// Official extremes for the shaped day; they win over observed ones.
    pub oso: Option<&'a OsoTable>,
}

impl<'a> ShapingContext<'a> {
    pub fn current(now: DateTime<Utc>, settings: &'a Settings) -> Self {
        Self::for_day(now, settings, 0)
    }

    pub fn for_day(now: DateTime<Utc>, settings: &'a Settings, days_ago: u32) -> Self {
        ShapingContext {
            now,
            settings,
            days_ago,
            oso: None,
        }
    }

    pub fn with_oso(self, oso: &'a OsoTable) -> Self {
        ShapingContext {
            oso: Some(oso),
            ..self
        }
    }

    /// The run-level climate day (registry default offset, UTC if unset),
    /// used for the document's `meta` block.
    pub fn document_day(&self) -> ClimateDay {
        let offset = self
            .settings
            .utc_offset_hours
            .and_then(offset_from_hours)
            .unwrap_or_else(|| Utc.fix());
        ClimateDay::containing(self.now, offset, self.days_ago)
    }
}

/// Builds the payload for one station.
///
/// `observations` is `None` when the observations source returned nothing
/// for the station; the record is still produced, with sentinels.
pub fn shape_station(
    station: &StationConfig,
    observations: Option<&ObservationSet>,
    normals: &ResolvedNormals,
    ctx: &ShapingContext<'_>,
) -> StationPayload {
    let empty;
    let obs = match observations {
        Some(obs) => obs,
        None => {
            empty = ObservationSet::empty(&station.stid);
            &empty
        }
    };
    let meta = &obs.meta;

    let offset = resolve_offset(station, ctx.settings, meta);
    let day = offset.map(|o| ClimateDay::containing(ctx.now, o, ctx.days_ago));
    if day.is_none() {
        debug!(stid = %station.stid, "timezone unresolved, daily fields missing");
    }

    let range = day.map(|d| daily_temp_range(obs, &d)).unwrap_or_default();
    let official = day.and(ctx.oso).and_then(|table| table.get(&station.stid));
    let daily_max_f = official.map(|o| o.high_f).or(range.max.map(|t| t.value_f));
    let daily_min_f = official.map(|o| o.low_f).or(range.min.map(|t| t.value_f));
    let daily_in = day.and_then(|d| daily_precip(obs, &d));

    // A past day's station total stops at that day's end.
    let until = if ctx.days_ago == 0 { None } else { day.map(|d| d.end) };
    let station_wy = water_year_start(ctx.now, offset, ctx.settings.water_year_anchor)
        .and_then(|start| station_water_year_in(&obs.timeseries, start, until));

    // The percent is taken from the published (rounded) figures, so a normal
    // that prints as 0.0 never sits next to a finite percent.
    let water_year_in =
        reported_water_year(station, normals, station_wy, daily_in, ctx).and_then(hundredths);
    let water_year_norm_in = normals.water_year_norm_in.and_then(hundredths);
    let percent = percent_of_normal(water_year_in, water_year_norm_in);

    let name = meta
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| station.name.clone())
        .unwrap_or_else(|| station.stid.clone());

    let latest = obs.latest.as_ref();

    StationPayload {
        stid: station.stid.clone(),
        name,
        latitude: meta.latitude.filter(|v| v.is_finite()),
        longitude: meta.longitude.filter(|v| v.is_finite()),
        elevation: meta.elevation_ft.filter(|v| v.is_finite()),
        date_time: latest.map(|l| l.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
        air_temp_f: latest.and_then(|l| l.value_f).and_then(whole_degrees),
        daily_max_f: daily_max_f.and_then(whole_degrees),
        daily_min_f: daily_min_f.and_then(whole_degrees),
        daily_accum_in: daily_in.and_then(hundredths),
        water_year_in,
        water_year_norm_in,
        percent_of_norm: percent,
    }
}

/// The water-year total to publish: the normals source's figure when it has
/// one, else the station gauge's own accumulation.
fn reported_water_year(
    station: &StationConfig,
    normals: &ResolvedNormals,
    station_wy: Option<f64>,
    daily_in: Option<f64>,
    ctx: &ShapingContext<'_>,
) -> Option<f64> {
    match (normals.water_year_in, station_wy) {
        (Some(reported), Some(gauge)) => {
            debug!(
                stid = %station.stid,
                normals_source = reported,
                station_gauge = gauge,
                "water-year cross-check"
            );
        }
        (None, Some(_)) => {
            debug!(stid = %station.stid, "using station gauge for water-year total");
        }
        _ => {}
    }

    match normals.water_year_in {
        Some(reported) if ctx.settings.add_current_day_to_normals && ctx.days_ago == 0 => {
            Some(reported + daily_in.unwrap_or(0.0))
        }
        Some(reported) => Some(reported),
        None => station_wy,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_registry;
    use crate::model::{
        LatestReading, NormalsOrigin, OsoExtremes, PrecipIncrement, StationMeta, TempSample,
        TimeseriesSample,
    };
    use chrono::TimeZone;

    /// Registry default of UTC-8: the climate day runs 08Z to 08Z.
    fn pacific() -> Settings {
        Settings {
            utc_offset_hours: Some(-8.0),
            ..Settings::default()
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        utc(2024, 1, 2, 20, 0)
    }

    fn observations() -> ObservationSet {
        ObservationSet {
            stid: "KSFO".to_string(),
            meta: StationMeta {
                name: Some("San Francisco Intl".to_string()),
                latitude: Some(37.61961),
                longitude: Some(-122.36558),
                elevation_ft: Some(13.0),
            },
            latest: Some(LatestReading {
                value_f: Some(56.6),
                timestamp: utc(2024, 1, 2, 19, 56),
            }),
            recent_temps: vec![
                TempSample { timestamp: utc(2024, 1, 2, 7, 56), temp_f: Some(70.0) },
                TempSample { timestamp: utc(2024, 1, 2, 9, 56), temp_f: Some(48.2) },
                TempSample { timestamp: utc(2024, 1, 2, 19, 56), temp_f: Some(56.6) },
            ],
            reported_extrema: Vec::new(),
            hourly_precip: vec![
                PrecipIncrement { timestamp: utc(2024, 1, 2, 10, 0), amount_in: Some(0.12) },
                PrecipIncrement { timestamp: utc(2024, 1, 2, 11, 0), amount_in: Some(-0.3) },
                PrecipIncrement { timestamp: utc(2024, 1, 2, 12, 0), amount_in: Some(0.05) },
            ],
            timeseries: Vec::new(),
        }
    }

    fn normals(wy: f64, norm: f64) -> ResolvedNormals {
        ResolvedNormals {
            water_year_in: Some(wy),
            water_year_norm_in: Some(norm),
            origin: NormalsOrigin::Primary,
        }
    }

    #[test]
    fn test_shape_station_full_record() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(3.45, 5.67),
            &ctx,
        );

        assert_eq!(payload.stid, "KSFO");
        assert_eq!(payload.name, "San Francisco Intl");
        assert_eq!(payload.elevation, Some(13.0));
        assert_eq!(payload.date_time.as_deref(), Some("2024-01-02T19:56:00Z"));
        assert_eq!(payload.air_temp_f, Some(57));
        assert_eq!(payload.daily_max_f, Some(57));
        assert_eq!(payload.daily_min_f, Some(48));
        assert_eq!(payload.daily_accum_in, Some(0.17));
        assert_eq!(payload.water_year_in, Some(3.45));
        assert_eq!(payload.water_year_norm_in, Some(5.67));
        assert_eq!(payload.percent_of_norm, Some(61));
    }

    #[test]
    fn test_missing_observations_still_produce_record() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let mut station = StationConfig::new("SFOC1");
        station.name = Some("San Francisco Downtown".to_string());

        let payload = shape_station(&station, None, &normals(7.5, 5.0), &ctx);

        assert_eq!(payload.stid, "SFOC1");
        assert_eq!(payload.name, "San Francisco Downtown");
        assert_eq!(payload.air_temp_f, None);
        assert_eq!(payload.daily_max_f, None);
        assert_eq!(payload.daily_accum_in, None);
        assert_eq!(payload.date_time, None);
        assert_eq!(payload.water_year_in, Some(7.5));
        assert_eq!(payload.percent_of_norm, Some(150));
    }

    #[test]
    fn test_unresolved_timezone_only_degrades_daily_fields() {
        let settings = Settings::default();
        let ctx = ShapingContext::current(now(), &settings);
        let mut obs = observations();
        obs.meta.longitude = None;

        let payload = shape_station(&StationConfig::new("KSFO"), Some(&obs), &normals(1.0, 2.0), &ctx);

        assert_eq!(payload.daily_max_f, None);
        assert_eq!(payload.daily_min_f, None);
        assert_eq!(payload.daily_accum_in, None);
        assert_eq!(payload.air_temp_f, Some(57));
        assert_eq!(payload.percent_of_norm, Some(50));
    }

    #[test]
    fn test_station_gauge_used_when_normals_missing() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let mut obs = observations();
        obs.timeseries = vec![
            TimeseriesSample { timestamp: utc(2023, 10, 2, 0, 0), temp_f: None, precip_in: Some(0.0) },
            TimeseriesSample { timestamp: utc(2024, 1, 1, 0, 0), temp_f: None, precip_in: Some(4.25) },
        ];

        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&obs),
            &ResolvedNormals::unavailable(),
            &ctx,
        );

        assert_eq!(payload.water_year_in, Some(4.25));
        assert_eq!(payload.water_year_norm_in, None);
        assert_eq!(payload.percent_of_norm, None);
    }

    #[test]
    fn test_current_day_added_to_normals_when_enabled() {
        let mut settings = pacific();
        settings.add_current_day_to_normals = true;
        let ctx = ShapingContext::current(now(), &settings);

        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(3.0, 6.0),
            &ctx,
        );
        assert_eq!(payload.water_year_in, Some(3.17));
        assert_eq!(payload.percent_of_norm, Some(53));

        let yesterday = ShapingContext { days_ago: 1, ..ctx };
        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(3.0, 6.0),
            &yesterday,
        );
        assert_eq!(payload.water_year_in, Some(3.0));
    }

    #[test]
    fn test_zero_normal_gives_sentinel_percent() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(5.0, 0.0),
            &ctx,
        );
        assert_eq!(payload.water_year_norm_in, Some(0.0));
        assert_eq!(payload.percent_of_norm, None);
    }

    #[test]
    fn test_serialization_writes_sentinel() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let payload = shape_station(
            &StationConfig::new("NODATA"),
            None,
            &ResolvedNormals::unavailable(),
            &ctx,
        );
        let json = serde_json::to_value(&payload).unwrap();

        for field in [
            "latitude",
            "longitude",
            "elevation",
            "airTempF",
            "dailyMaxF",
            "dailyMinF",
            "dailyAccumIN",
            "waterYearIN",
            "waterYearNormIN",
            "percentOfNorm",
        ] {
            assert_eq!(json[field], serde_json::json!(9999), "{} should be the sentinel", field);
        }
        assert_eq!(json["stid"], "NODATA");
        assert!(json["dateTime"].is_null());
    }

    #[test]
    fn test_document_day_uses_registry_offset() {
        let settings = pacific();
        let ctx = ShapingContext::current(utc(2026, 1, 13, 10, 0), &settings);
        let meta = PayloadMeta::new(ctx.now, &ctx.document_day());
        assert_eq!(meta.climate_day_start, "2026-01-13T08:00:00+00:00");
        assert_eq!(meta.climate_day_end, "2026-01-14T08:00:00+00:00");
        assert_eq!(meta.climate_day_label, "2026-01-13");
        assert_eq!(meta.generated_at, "2026-01-13T10:00:00+00:00");
    }

    #[test]
    fn test_longitude_derived_day_without_registry_offset() {
        let registry = parse_registry("[stations]\nASOS = [\"KJFK\"]\n").unwrap();
        let ctx = ShapingContext::current(utc(2024, 1, 2, 16, 0), &registry.settings);
        let obs = ObservationSet {
            meta: StationMeta {
                longitude: Some(-73.78),
                ..Default::default()
            },
            recent_temps: vec![
                // 23:30 EST on Jan 1
                TempSample { timestamp: utc(2024, 1, 2, 4, 30), temp_f: Some(20.0) },
                TempSample { timestamp: utc(2024, 1, 2, 6, 0), temp_f: Some(35.0) },
                TempSample { timestamp: utc(2024, 1, 2, 15, 0), temp_f: Some(41.0) },
            ],
            ..ObservationSet::empty("KJFK")
        };

        let payload = shape_station(
            registry.find("KJFK").unwrap(),
            Some(&obs),
            &ResolvedNormals::unavailable(),
            &ctx,
        );
        assert_eq!(payload.daily_min_f, Some(35), "previous local evening is excluded");
        assert_eq!(payload.daily_max_f, Some(41));
    }

    #[test]
    fn test_normal_rounding_to_zero_gives_sentinel_percent() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(1.0, 0.004),
            &ctx,
        );
        assert_eq!(payload.water_year_norm_in, Some(0.0));
        assert_eq!(payload.percent_of_norm, None);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["waterYearNormIN"], 0.0);
        assert_eq!(json["percentOfNorm"], 9999);
    }

    #[test]
    fn test_percent_uses_published_totals() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        // 0.994 / 0.996 would be 100%; the published 0.99 / 1.0 is 99%.
        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(0.994, 0.996),
            &ctx,
        );
        assert_eq!(payload.water_year_in, Some(0.99));
        assert_eq!(payload.water_year_norm_in, Some(1.0));
        assert_eq!(payload.percent_of_norm, Some(99));
    }

    #[test]
    fn test_implausible_temperatures_are_missing_not_sentinel_lookalikes() {
        let settings = pacific();
        let ctx = ShapingContext::current(now(), &settings);
        let mut obs = observations();
        obs.latest = Some(LatestReading {
            value_f: Some(9999.2),
            timestamp: utc(2024, 1, 2, 19, 56),
        });
        obs.recent_temps.push(TempSample {
            timestamp: utc(2024, 1, 2, 19, 56),
            temp_f: Some(9999.2),
        });

        let payload = shape_station(&StationConfig::new("KSFO"), Some(&obs), &normals(1.0, 2.0), &ctx);
        assert_eq!(payload.air_temp_f, None);
        assert_eq!(payload.daily_max_f, Some(57), "the garbage reading is not the high");
    }

    #[test]
    fn test_official_extremes_take_priority() {
        let settings = pacific();
        let mut table = OsoTable::new();
        table.insert("KSFO".to_string(), OsoExtremes { high_f: 75.4, low_f: 31.6 });
        let ctx = ShapingContext::current(now(), &settings).with_oso(&table);

        let official = shape_station(
            &StationConfig::new("KSFO"),
            Some(&observations()),
            &normals(1.0, 2.0),
            &ctx,
        );
        assert_eq!(official.daily_max_f, Some(75));
        assert_eq!(official.daily_min_f, Some(32));
        assert_eq!(official.air_temp_f, Some(57), "latest reading is not affected");

        let mut other = observations();
        other.stid = "KSJC".to_string();
        let observed =
            shape_station(&StationConfig::new("KSJC"), Some(&other), &normals(1.0, 2.0), &ctx);
        assert_eq!(observed.daily_max_f, Some(57));
        assert_eq!(observed.daily_min_f, Some(48));
    }

    #[test]
    fn test_previous_day_context() {
        let settings = pacific();
        let ctx = ShapingContext::for_day(now(), &settings, 1);
        assert_eq!(ctx.document_day().label(), "2024-01-01");

        let mut obs = observations();
        obs.recent_temps.push(TempSample {
            timestamp: utc(2024, 1, 1, 20, 0),
            temp_f: Some(63.0),
        });
        obs.timeseries = vec![
            TimeseriesSample { timestamp: utc(2023, 10, 2, 0, 0), temp_f: None, precip_in: Some(0.0) },
            TimeseriesSample { timestamp: utc(2024, 1, 1, 12, 0), temp_f: None, precip_in: Some(2.0) },
            TimeseriesSample { timestamp: utc(2024, 1, 2, 12, 0), temp_f: None, precip_in: Some(3.0) },
        ];

        let payload = shape_station(
            &StationConfig::new("KSFO"),
            Some(&obs),
            &ResolvedNormals::unavailable(),
            &ctx,
        );
        assert_eq!(payload.daily_max_f, Some(70), "yesterday's window holds the 07:56Z reading");
        assert_eq!(payload.daily_min_f, Some(63));
        assert_eq!(payload.daily_accum_in, Some(2.0), "yesterday's gauge counter difference");
        assert_eq!(payload.water_year_in, Some(2.0), "gauge total stops at yesterday's end");
    }
}
