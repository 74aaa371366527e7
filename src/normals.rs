/// Normals resolution with single-level station fallback.
///
/// Some stations are unknown to the normals source, or have a gap in their
/// record. For those the registry names an alternate station id whose totals
/// stand in for the primary's. Only the precipitation totals are borrowed;
/// everything displayed about the station still comes from the primary.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::StationConfig;
use crate::model::{NormalsOrigin, NormalsResult, ResolvedNormals};

/// Anything that can answer "what are the water-year totals for this id?".
///
/// Implementations must not fail: a source that cannot answer returns
/// `NormalsResult::unavailable()`.
pub trait NormalsLookup: Send + Sync {
    fn lookup(&self, stid: &str) -> NormalsResult;
}

/// Normals that were fetched ahead of time.
#[derive(Debug, Clone, Default)]
pub struct PrefetchedNormals {
    results: HashMap<String, NormalsResult>,
}

impl PrefetchedNormals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, stid: &str, result: NormalsResult) {
        self.results.insert(stid.to_string(), result);
    }
}

impl FromIterator<(String, NormalsResult)> for PrefetchedNormals {
    fn from_iter<I: IntoIterator<Item = (String, NormalsResult)>>(iter: I) -> Self {
        PrefetchedNormals {
            results: iter.into_iter().collect(),
        }
    }
}

impl NormalsLookup for PrefetchedNormals {
    fn lookup(&self, stid: &str) -> NormalsResult {
        self.results
            .get(stid)
            .copied()
            .unwrap_or_else(NormalsResult::unavailable)
    }
}

/// Runs the fallback protocol for one station.
///
/// 1. A complete primary result is used as is.
/// 2. Otherwise the configured fallback id is queried exactly once; a
///    complete fallback result replaces the primary's values.
/// 3. Otherwise whatever the primary did report is kept field by field.
///
/// The fallback's own fallback is never consulted.
pub fn resolve_normals(station: &StationConfig, source: &dyn NormalsLookup) -> ResolvedNormals {
    let primary = source.lookup(&station.stid);
    if primary.is_complete() {
        return from_result(&primary, NormalsOrigin::Primary);
    }

    if let Some(fallback_id) = station.normals_fallback.as_deref() {
        let fallback = source.lookup(fallback_id);
        if fallback.is_complete() {
            warn!(
                stid = %station.stid,
                fallback = %fallback_id,
                "normals unavailable for primary station, using fallback"
            );
            return from_result(&fallback, NormalsOrigin::Fallback(fallback_id.to_string()));
        }
        warn!(
            stid = %station.stid,
            fallback = %fallback_id,
            "normals unavailable for primary and fallback station"
        );
    } else {
        warn!(stid = %station.stid, "normals unavailable and no fallback configured");
    }

    if primary.is_empty() {
        ResolvedNormals::unavailable()
    } else {
        debug!(stid = %station.stid, "keeping partial normals from primary station");
        from_result(&primary, NormalsOrigin::Primary)
    }
}

fn from_result(result: &NormalsResult, origin: NormalsOrigin) -> ResolvedNormals {
    ResolvedNormals {
        water_year_in: result.water_year_in.value(),
        water_year_norm_in: result.water_year_norm_in.value(),
        origin,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
