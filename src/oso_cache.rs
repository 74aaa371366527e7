/// Official daily extremes and their per-day cache.
///
/// An OSO product only reports the extremes as of its issue time, and a
/// product can go stale or missing for hours. The cache keeps, per station,
/// the highest high and lowest low seen during the station's current climate
/// day. When the station's day rolls over, the finished entry moves to the
/// yesterday cache, which feeds the previous day's document.
///
/// Both caches are small JSON files. A missing or corrupt cache is treated
/// as empty; failing to save one costs accuracy, not the run.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::climate_day::{ClimateDay, resolve_offset};
use crate::config::StationRegistry;
use crate::ingest::oso::{OsoReport, read_product};
use crate::model::{ObservationSet, OsoExtremes, OsoTable, StationMeta};
use crate::output::{OutputError, create_parent};

/// One station's extremes for one climate day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Climate-day label, `YYYY-MM-DD`.
    pub day: String,
    pub max_hi_f: f64,
    pub min_lo_f: f64,
    pub last_update: DateTime<Utc>,
}

impl CacheEntry {
    fn from_report(day: &str, report: &OsoReport) -> Self {
        CacheEntry {
            day: day.to_string(),
            max_hi_f: report.high_f,
            min_lo_f: report.low_f,
            last_update: report.issued,
        }
    }

    pub fn extremes(&self) -> OsoExtremes {
        OsoExtremes {
            high_f: self.max_hi_f,
            low_f: self.min_lo_f,
        }
    }
}

/// Cache entries keyed by station id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsoCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl OsoCache {
    /// Loads a cache file; missing, unreadable or corrupt files give an
    /// empty cache.
    pub fn load(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "OSO cache unreadable; starting empty");
                return Self::default();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "OSO cache corrupt; starting empty");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), OutputError> {
        let rendered = serde_json::to_string_pretty(self)?;
        create_parent(path)?;
        fs::write(path, rendered).map_err(|e| OutputError::Io(path.to_path_buf(), e))
    }

    pub fn get(&self, stid: &str) -> Option<&CacheEntry> {
        self.entries.get(stid)
    }

    pub fn insert(&mut self, stid: &str, entry: CacheEntry) {
        self.entries.insert(stid.to_string(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns the station's entry when it belongs to a day
    /// other than `day`.
    pub fn take_other_day(&mut self, stid: &str, day: &str) -> Option<CacheEntry> {
        if self.entries.get(stid).is_some_and(|e| e.day != day) {
            self.entries.remove(stid)
        } else {
            None
        }
    }

    /// Folds a fresh report into the station's entry for `day`, starting a
    /// new entry when the cached one is for another day.
    pub fn record(&mut self, stid: &str, day: &str, report: &OsoReport) -> OsoExtremes {
        match self.entries.get_mut(stid) {
            Some(entry) if entry.day == day => {
                entry.max_hi_f = entry.max_hi_f.max(report.high_f);
                entry.min_lo_f = entry.min_lo_f.min(report.low_f);
                entry.last_update = entry.last_update.max(report.issued);
                entry.extremes()
            }
            _ => {
                let entry = CacheEntry::from_report(day, report);
                let extremes = entry.extremes();
                self.insert(stid, entry);
                extremes
            }
        }
    }

    /// The station's extremes for `day`, if cached.
    pub fn extremes(&self, stid: &str, day: &str) -> Option<OsoExtremes> {
        self.entries
            .get(stid)
            .filter(|e| e.day == day)
            .map(CacheEntry::extremes)
    }
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Official extremes for the two documents a run can write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfficialExtremes {
    pub today: OsoTable,
    pub yesterday: OsoTable,
}

/// Reads every configured station's OSO product, folds it into the caches
/// and returns the extremes for the current and previous climate days.
///
/// Does nothing (and touches no file) when no OSO directory is configured
/// or no station has a product.
pub fn refresh(
    registry: &StationRegistry,
    observations: &HashMap<String, ObservationSet>,
    now: DateTime<Utc>,
) -> OfficialExtremes {
    let settings = &registry.settings;
    let mut extremes = OfficialExtremes::default();
    let Some(dir) = settings.oso_dir.as_deref() else {
        return extremes;
    };
    if registry.stations.iter().all(|s| s.oso_product.is_none()) {
        return extremes;
    }

    let mut today = OsoCache::load(&settings.oso_cache_path);
    let mut yesterday = OsoCache::load(&settings.oso_yesterday_cache_path);
    let no_meta = StationMeta::default();

    for station in &registry.stations {
        let Some(product) = station.oso_product.as_deref() else {
            continue;
        };
        let stid = station.stid.as_str();
        let meta = observations.get(stid).map(|o| &o.meta).unwrap_or(&no_meta);
        let Some(offset) = resolve_offset(station, settings, meta) else {
            debug!(stid = %stid, "timezone unresolved, OSO product skipped");
            continue;
        };
        let day = ClimateDay::containing(now, offset, 0);
        let (label, previous_label) = (day.label(), ClimateDay::containing(now, offset, 1).label());

        if let Some(finished) = today.take_other_day(stid, &label) {
            if finished.day == previous_label {
                info!(stid = %stid, day = %finished.day, "OSO extremes moved to yesterday");
                yesterday.insert(stid, finished);
            }
        }

        match read_product(dir, product, now) {
            Ok(report) if day.contains(report.issued) => {
                let merged = today.record(stid, &label, &report);
                debug!(stid = %stid, high_f = merged.high_f, low_f = merged.low_f, "OSO extremes updated");
            }
            Ok(report) => {
                debug!(stid = %stid, issued = %report.issued, "OSO product is from another climate day");
            }
            Err(e) if e.is_not_found() => {
                debug!(stid = %stid, product = %product, "no OSO product on disk");
            }
            Err(e) => {
                warn!(stid = %stid, error = %e, "OSO product skipped");
            }
        }

        if let Some(x) = today.extremes(stid, &label) {
            extremes.today.insert(stid.to_string(), x);
        }
        if let Some(x) = yesterday.extremes(stid, &previous_label) {
            extremes.yesterday.insert(stid.to_string(), x);
        }
    }

    for (cache, path) in [
        (&today, &settings.oso_cache_path),
        (&yesterday, &settings.oso_yesterday_cache_path),
    ] {
        if let Err(e) = cache.save(path) {
            warn!(path = %path.display(), error = %e, "failed to save OSO cache");
        }
    }

    info!(
        today = extremes.today.len(),
        yesterday = extremes.yesterday.len(),
        "official extremes collected"
    );
    extremes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
