/// Run orchestration: normals collection, document assembly and publishing.
///
/// Normals are the one per-station network fan-out, so they are collected on
/// a thread pool. Each job sends `(index, result)` back over a channel and
/// the results are re-sorted, so the output order is always the registry
/// order. Shaping itself is sequential and pure.
///
/// Publishing writes the current day's document. When the file on disk
/// belongs to an earlier climate day, the previous day's document is rebuilt
/// from the same inputs (previous-day window, yesterday's official extremes)
/// and written to the yesterday path.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;

use chrono::{DateTime, Utc};
use threadpool::ThreadPool;
use tracing::{info, warn};

use crate::config::StationRegistry;
use crate::model::{NormalsOrigin, ObservationSet, ResolvedNormals};
use crate::normals::{NormalsLookup, resolve_normals};
use crate::oso_cache::OfficialExtremes;
use crate::output::{OutputError, day_rolled_over, write_document};
use crate::payload::{PayloadDocument, PayloadMeta, ShapingContext, StationPayload, shape_station};

/// Resolves normals for every configured station, in registry order.
///
/// A job that dies without reporting leaves its station unavailable rather
/// than failing the run.
pub fn collect_normals(
    registry: &StationRegistry,
    source: Arc<dyn NormalsLookup>,
) -> Vec<ResolvedNormals> {
    let workers = registry.settings.worker_threads.max(1);
    let pool = ThreadPool::new(workers);
    let (tx, rx) = mpsc::channel();

    for (index, station) in registry.stations.iter().enumerate() {
        let tx = tx.clone();
        let source = Arc::clone(&source);
        let station = station.clone();
        pool.execute(move || {
            let resolved = resolve_normals(&station, source.as_ref());
            // The receiver outlives the pool; a send error means the run is over.
            let _ = tx.send((index, resolved));
        });
    }
    drop(tx);

    let mut results: Vec<(usize, ResolvedNormals)> = rx.iter().collect();
    pool.join();
    results.sort_by_key(|(index, _)| *index);

    let mut ordered = vec![ResolvedNormals::unavailable(); registry.stations.len()];
    for (index, resolved) in results {
        ordered[index] = resolved;
    }

    let fallbacks = ordered
        .iter()
        .filter(|n| matches!(n.origin, NormalsOrigin::Fallback(_)))
        .count();
    let unavailable = ordered
        .iter()
        .filter(|n| n.origin == NormalsOrigin::Unavailable)
        .count();
    info!(
        stations = ordered.len(),
        fallbacks,
        unavailable,
        workers,
        "normals collected"
    );
    ordered
}

/// Shapes one record per configured station, in registry order.
///
/// `normals` is indexed like `registry.stations`; a short slice leaves the
/// trailing stations without normals.
pub fn shape_all(
    registry: &StationRegistry,
    observations: &HashMap<String, ObservationSet>,
    normals: &[ResolvedNormals],
    ctx: &ShapingContext<'_>,
) -> Vec<StationPayload> {
    if normals.len() != registry.stations.len() {
        warn!(
            expected = registry.stations.len(),
            received = normals.len(),
            "normals count does not match station count"
        );
    }

    let unavailable = ResolvedNormals::unavailable();
    registry
        .stations
        .iter()
        .enumerate()
        .map(|(i, station)| {
            let station_normals = normals.get(i).unwrap_or(&unavailable);
            shape_station(station, observations.get(&station.stid), station_normals, ctx)
        })
        .collect()
}

/// Builds the complete output document for the context's climate day.
pub fn build_document(
    registry: &StationRegistry,
    observations: &HashMap<String, ObservationSet>,
    normals: &[ResolvedNormals],
    ctx: &ShapingContext<'_>,
) -> PayloadDocument {
    let data = shape_all(registry, observations, normals, ctx);

    let missing = registry
        .stations
        .iter()
        .filter(|s| !observations.contains_key(&s.stid))
        .count();
    if missing > 0 {
        warn!(missing, "stations without observations are emitted with sentinels");
    }

    PayloadDocument {
        meta: PayloadMeta::new(ctx.now, &ctx.document_day()),
        data,
    }
}

/// The documents one run wrote.
#[derive(Debug)]
pub struct Published {
    pub today: PayloadDocument,
    /// Rebuilt only when the climate day rolled over since the last run.
    pub yesterday: Option<PayloadDocument>,
}

/// Builds the current day's document and writes it to `output`, first
/// rebuilding the previous day's document when `output` holds an earlier
/// climate day.
pub fn publish(
    registry: &StationRegistry,
    observations: &HashMap<String, ObservationSet>,
    normals: &[ResolvedNormals],
    official: &OfficialExtremes,
    now: DateTime<Utc>,
    output: &Path,
) -> Result<Published, OutputError> {
    let settings = &registry.settings;
    let today_ctx = ShapingContext::current(now, settings).with_oso(&official.today);
    let today = build_document(registry, observations, normals, &today_ctx);

    let yesterday = if day_rolled_over(output, &today.meta.climate_day_label) {
        let ctx = ShapingContext::for_day(now, settings, 1).with_oso(&official.yesterday);
        let doc = build_document(registry, observations, normals, &ctx);
        write_document(&doc, &settings.yesterday_output_path)?;
        info!(
            path = %settings.yesterday_output_path.display(),
            climate_day = %doc.meta.climate_day_label,
            "previous climate day rebuilt"
        );
        Some(doc)
    } else {
        None
    };

    write_document(&today, output)?;
    Ok(Published { today, yesterday })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
