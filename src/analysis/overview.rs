//! Dashboard and per-water-body summaries.
//!
//! These read through the store facade and run every measurement through
//! the same evaluator the export uses, so a site flagged on the dashboard
//! is flagged identically in the spreadsheet. `now` is always passed in.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::alert::thresholds::{evaluate, Evaluation};
use crate::model::{GeoPoint, Measurement, WaterBody};
use crate::standards::StandardsRegistry;
use crate::store::{MeasurementFilter, StoreError, WaterQualityStore};

/// "Recent" on the dashboard means measured within this many days.
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// How many alerting measurements the dashboard lists.
pub const RECENT_ALERTS_SHOWN: usize = 10;

/// How many measurements the water body detail view lists.
pub const DETAIL_MEASUREMENTS_SHOWN: usize = 50;

/// Dashboard trend window, in days.
pub const TREND_WINDOW_DAYS: i64 = 7;

/// How many active water bodies get a dashboard trend series.
pub const TREND_WATER_BODIES: usize = 5;

/// Points in the water body detail trend.
pub const DETAIL_TREND_POINTS: usize = 30;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedMeasurement {
    pub water_body: String,
    pub measurement: Measurement,
    pub evaluation: Evaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterBodyStatus {
    pub water_body_id: i64,
    pub name: String,
    pub water_body_type: &'static str,
    pub location: GeoPoint,
    pub latest_measured_at: Option<DateTime<Utc>>,
    pub has_alerts: bool,
    /// Tier of the latest measurement, or `"unknown"` when there is none.
    pub quality_status: String,
}

/// One point of a trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub measured_at: DateTime<Utc>,
    /// Axis label: `YYYY-MM-DD` on the dashboard, `YYYY-MM-DD HH:MM` in detail.
    pub label: String,
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub temperature: f64,
    pub turbidity: f64,
}

impl TrendPoint {
    fn new(m: &Measurement, label_format: &str) -> Self {
        Self {
            measured_at: m.measured_at,
            label: m.measured_at.format(label_format).to_string(),
            ph: m.readings.ph,
            dissolved_oxygen: m.readings.dissolved_oxygen,
            temperature: m.readings.temperature,
            turbidity: m.readings.turbidity,
        }
    }
}

/// Oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub water_body: String,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub generated_at: DateTime<Utc>,
    pub total_water_bodies: usize,
    pub total_measurements: usize,
    pub recent_count: usize,
    pub alert_count: usize,
    /// Most recent first, at most `RECENT_ALERTS_SHOWN`.
    pub recent_alerts: Vec<EvaluatedMeasurement>,
    /// Active water bodies, by name.
    pub water_bodies: Vec<WaterBodyStatus>,
    /// Last `TREND_WINDOW_DAYS` for the first `TREND_WATER_BODIES` active
    /// water bodies. Water bodies with nothing in the window are left out.
    pub trends: Vec<TrendSeries>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterAverages {
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub temperature: f64,
    pub turbidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterBodyDetail {
    pub water_body: WaterBody,
    /// Most recent first, at most `DETAIL_MEASUREMENTS_SHOWN`.
    pub measurements: Vec<EvaluatedMeasurement>,
    /// Over all of the water body's measurements.
    pub averages: Option<ParameterAverages>,
    /// The latest `DETAIL_TREND_POINTS` measurements, oldest first.
    pub trend: Vec<TrendPoint>,
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn dashboard_overview<S: WaterQualityStore + ?Sized>(
    store: &mut S,
    standards: &StandardsRegistry,
    now: DateTime<Utc>,
) -> Result<DashboardOverview, StoreError> {
    let active = store.list_water_bodies(true)?;
    let total_measurements = store.count_measurements()?;

    let recent_filter = MeasurementFilter {
        start: Some(now - Duration::days(RECENT_WINDOW_DAYS)),
        ..Default::default()
    };
    let recent = store.list_measurements_with_water_bodies(&recent_filter)?;
    let recent_count = recent.len();

    let alerting: Vec<EvaluatedMeasurement> = recent
        .into_iter()
        .filter_map(|(measurement, wb)| {
            let evaluation = evaluate(&measurement.readings, standards);
            evaluation.has_alerts().then(|| EvaluatedMeasurement {
                water_body: wb.name,
                measurement,
                evaluation,
            })
        })
        .collect();
    let alert_count = alerting.len();

    let mut water_bodies = Vec::with_capacity(active.len());
    for wb in &active {
        let latest_filter = MeasurementFilter {
            limit: Some(1),
            ..MeasurementFilter::for_water_body(wb.id)
        };
        let latest = store.list_measurements(&latest_filter)?.into_iter().next();
        water_bodies.push(water_body_status(wb, latest.as_ref(), standards));
    }

    let trend_start = now - Duration::days(TREND_WINDOW_DAYS);
    let mut trends = Vec::new();
    for wb in active.iter().take(TREND_WATER_BODIES) {
        let filter = MeasurementFilter {
            start: Some(trend_start),
            ..MeasurementFilter::for_water_body(wb.id)
        };
        let window = store.list_measurements(&filter)?;
        if window.is_empty() {
            continue;
        }
        trends.push(TrendSeries {
            water_body: wb.name.clone(),
            points: window.iter().rev().map(|m| TrendPoint::new(m, "%Y-%m-%d")).collect(),
        });
    }

    Ok(DashboardOverview {
        generated_at: now,
        total_water_bodies: active.len(),
        total_measurements,
        recent_count,
        alert_count,
        recent_alerts: alerting.into_iter().take(RECENT_ALERTS_SHOWN).collect(),
        water_bodies,
        trends,
    })
}

pub fn water_body_status(
    water_body: &WaterBody,
    latest: Option<&Measurement>,
    standards: &StandardsRegistry,
) -> WaterBodyStatus {
    let evaluation = latest.map(|m| evaluate(&m.readings, standards));
    WaterBodyStatus {
        water_body_id: water_body.id,
        name: water_body.name.clone(),
        water_body_type: water_body.water_body_type.label(),
        location: water_body.location,
        latest_measured_at: latest.map(|m| m.measured_at),
        has_alerts: evaluation.as_ref().is_some_and(|e| e.has_alerts()),
        quality_status: evaluation
            .map(|e| e.tier.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// Returns `None` if the water body does not exist.
pub fn water_body_detail<S: WaterQualityStore + ?Sized>(
    store: &mut S,
    water_body_id: i64,
    standards: &StandardsRegistry,
) -> Result<Option<WaterBodyDetail>, StoreError> {
    let Some(water_body) = store.get_water_body(water_body_id)? else {
        return Ok(None);
    };

    let all = store.list_measurements(&MeasurementFilter::for_water_body(water_body_id))?;
    let averages = parameter_averages(&all);
    let trend = all
        .iter()
        .take(DETAIL_TREND_POINTS)
        .rev()
        .map(|m| TrendPoint::new(m, "%Y-%m-%d %H:%M"))
        .collect();
    let measurements = all
        .into_iter()
        .take(DETAIL_MEASUREMENTS_SHOWN)
        .map(|measurement| EvaluatedMeasurement {
            water_body: water_body.name.clone(),
            evaluation: evaluate(&measurement.readings, standards),
            measurement,
        })
        .collect();

    Ok(Some(WaterBodyDetail {
        water_body,
        measurements,
        averages,
        trend,
    }))
}

/// Mean pH, dissolved oxygen, temperature and turbidity. `None` for no input.
pub fn parameter_averages(measurements: &[Measurement]) -> Option<ParameterAverages> {
    if measurements.is_empty() {
        return None;
    }
    let n = measurements.len() as f64;
    let sum = |f: fn(&Measurement) -> f64| measurements.iter().map(f).sum::<f64>() / n;
    Some(ParameterAverages {
        ph: sum(|m| m.readings.ph),
        dissolved_oxygen: sum(|m| m.readings.dissolved_oxygen),
        temperature: sum(|m| m.readings.temperature),
        turbidity: sum(|m| m.readings.turbidity),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
