/// station_payloads: per-station weather payloads for the climate dashboard.
///
/// # Module structure
///
/// ```text
/// station_payloads
/// ├── model       — shared data types (ObservationSet, NormalsResult, ResolvedNormals, …)
/// ├── config      — station registry loader (stations.toml)
/// ├── analysis
/// │   ├── climate_day — timezone resolution and the local-midnight window
/// │   ├── daily       — daily max/min temperature and precipitation since midnight
/// │   └── water_year  — water-year anchor, gauge-counter unwrapping, percent of normal
/// ├── normals     — normals lookup trait and single-level fallback resolution
/// ├── payload     — StationPayload record assembly and sentinel serialization
/// ├── pipeline    — parallel normals collection, document assembly, rollover publishing
/// ├── output      — JSON output writing and climate-day rollover detection
/// ├── oso_cache   — official daily extremes cache (today and yesterday)
/// ├── logging     — tracing subscriber setup for the binaries
/// └── ingest
///     ├── synoptic — Synoptic Data API: latest, hourly precipitation, timeseries
///     ├── acis     — RCC-ACIS StnData: water-year totals and normals
///     ├── oso      — NWS OSO text products: official daily high/low
///     └── fixtures (test only) — representative API response payloads
/// ```

/// Public modules
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normals;
pub mod oso_cache;
pub mod output;
pub mod payload;
pub mod pipeline;
