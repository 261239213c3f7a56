/// Summaries for the dashboard and water body pages.
///
/// Trend charts (`TrendSeries`, `TrendPoint`) and maps (`WaterBodyStatus`
/// positions) are drawn by the front end from these structures.
///
/// Submodules:
/// - `overview`: dashboard counts, per-site status and trends, plus water body statistics.

pub mod overview;
