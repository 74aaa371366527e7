/// Logging setup shared by the binaries
///
/// Output goes through `tracing_subscriber`'s fmt layer. `RUST_LOG`
/// wins when set; otherwise the crate's own targets log at the level the
/// binary asks for and everything else at `warn`.

use tracing_subscriber::EnvFilter;

/// Crate targets that receive log output at the requested level; dependencies
/// (reqwest, hyper) stay at `warn`.
const CRATE_TARGETS: &[&str] = &[
    "station_payloads",
    "build_station_payloads",
    "fetch_normals",
    "fetch_observations",
];

/// Installs the fmt subscriber for a binary.
///
/// `level` is one of `error`, `warn`, `info`, `debug`, `trace`.
/// `RUST_LOG` overrides it when set.
pub fn init(level: &str) {
    let default_filter: String = std::iter::once("warn".to_string())
        .chain(CRATE_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
