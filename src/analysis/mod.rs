/// Derived climate metrics for the station payload service.
///
/// Submodules:
/// - `climate_day` — timezone resolution and the local-midnight window.
/// - `daily`       — daily max/min temperature and precipitation since midnight.
/// - `water_year`  — water-year anchor, gauge-counter unwrapping, percent of normal.

pub mod climate_day;
pub mod daily;
pub mod water_year;
