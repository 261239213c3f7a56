/// Development mode utilities: sample data for demos and local testing
///
/// Seeds five well-known US water bodies and a few weeks of plausible
/// field measurements, roughly one in five of them breaching a standard.
/// Everything goes through `WaterQualityStore`, so the same seed works
/// against PostgreSQL or the in-memory store.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use crate::alert::thresholds::evaluate;
use crate::logging::{self, Component};
use crate::model::{NewMeasurement, NewWaterBody, WaterBodyType, WaterQualityReadings};
use crate::standards::StandardsRegistry;
use crate::store::{StoreError, WaterQualityStore};

/// Measurements are dated up to this many days (plus up to 23 hours) back.
pub const SEED_WINDOW_DAYS: i64 = 30;

/// Share of measurements pushed out of range on one parameter.
const ALERT_CHANCE: f64 = 0.2;

pub struct SampleWaterBody {
    pub name: &'static str,
    pub water_body_type: WaterBodyType,
    pub latitude: f64,
    pub longitude: f64,
    pub description: &'static str,
    pub regulatory_body: &'static str,
}

pub const SAMPLE_WATER_BODIES: [SampleWaterBody; 5] = [
    SampleWaterBody {
        name: "Lake Michigan",
        water_body_type: WaterBodyType::Lake,
        latitude: 42.3601,
        longitude: -87.0073,
        description: "One of the five Great Lakes of North America",
        regulatory_body: "EPA Region 5",
    },
    SampleWaterBody {
        name: "Mississippi River",
        water_body_type: WaterBodyType::River,
        latitude: 38.6270,
        longitude: -90.1994,
        description: "Major river system in North America",
        regulatory_body: "EPA Region 7",
    },
    SampleWaterBody {
        name: "Lake Tahoe",
        water_body_type: WaterBodyType::Lake,
        latitude: 39.0968,
        longitude: -120.0324,
        description: "Large freshwater lake in the Sierra Nevada",
        regulatory_body: "EPA Region 9",
    },
    SampleWaterBody {
        name: "Chesapeake Bay",
        water_body_type: WaterBodyType::Ocean,
        latitude: 38.3235,
        longitude: -76.4813,
        description: "Largest estuary in the United States",
        regulatory_body: "EPA Region 3",
    },
    SampleWaterBody {
        name: "Colorado River",
        water_body_type: WaterBodyType::River,
        latitude: 35.0456,
        longitude: -111.7356,
        description: "Major river in the southwestern United States",
        regulatory_body: "EPA Region 9",
    },
];

const RESEARCHERS: [&str; 4] = [
    "Dr. Sarah Johnson",
    "Dr. Mike Chen",
    "Dr. Emily Rodriguez",
    "Dr. James Wilson",
];

impl SampleWaterBody {
    fn to_new(&self) -> NewWaterBody {
        NewWaterBody {
            name: self.name.to_string(),
            water_body_type: self.water_body_type,
            latitude: self.latitude,
            longitude: self.longitude,
            description: self.description.to_string(),
            regulatory_body: self.regulatory_body.to_string(),
            monitoring_start_date: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedSummary {
    pub water_bodies_created: usize,
    pub water_bodies_existing: usize,
    pub measurements_created: usize,
    pub measurements_with_alerts: usize,
}

/// Creates the sample water bodies (if missing) and 2–5 random
/// measurements for each, dated relative to `now`.
pub fn seed_sample_data<S: WaterQualityStore + ?Sized, R: Rng>(
    store: &mut S,
    standards: &StandardsRegistry,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<SeedSummary, StoreError> {
    let mut summary = SeedSummary::default();

    let mut water_bodies = Vec::with_capacity(SAMPLE_WATER_BODIES.len());
    for sample in &SAMPLE_WATER_BODIES {
        let (wb, created) = store.get_or_create_water_body(sample.to_new())?;
        if created {
            logging::info(Component::Dev, Some(&wb.name), "created sample water body");
            summary.water_bodies_created += 1;
        } else {
            logging::debug(Component::Dev, Some(&wb.name), "sample water body already exists");
            summary.water_bodies_existing += 1;
        }
        water_bodies.push(wb);
    }

    for wb in &water_bodies {
        let count = rng.gen_range(2..=5);
        for i in 0..count {
            let measured_at = now
                - Duration::days(rng.gen_range(0..=SEED_WINDOW_DAYS))
                - Duration::hours(rng.gen_range(0..=23));
            let measurement = store.create_measurement(NewMeasurement {
                water_body_id: wb.id,
                measured_at,
                readings: sample_readings(rng),
                sample_latitude: None,
                sample_longitude: None,
                measured_by: RESEARCHERS[rng.gen_range(0..RESEARCHERS.len())].to_string(),
                notes: format!("Sample measurement #{}", i + 1),
            })?;
            summary.measurements_created += 1;

            let evaluation = evaluate(&measurement.readings, standards);
            if evaluation.has_alerts() {
                summary.measurements_with_alerts += 1;
                logging::warn(
                    Component::Dev,
                    Some(&wb.name),
                    &format!(
                        "{} - {} alert(s)",
                        measured_at.format("%Y-%m-%d"),
                        evaluation.alerts.len()
                    ),
                );
            }
        }
    }

    logging::info(
        Component::Dev,
        None,
        &format!(
            "seeded {} measurements for {} water bodies ({} with alerts)",
            summary.measurements_created,
            water_bodies.len(),
            summary.measurements_with_alerts
        ),
    );
    Ok(summary)
}

/// Plausible readings; with `ALERT_CHANCE` one of pH, dissolved oxygen,
/// temperature or E. coli is pushed past its usual limit.
pub fn sample_readings<R: Rng>(rng: &mut R) -> WaterQualityReadings {
    let mut ph = rng.gen_range(6.0..8.8);
    let mut dissolved_oxygen = rng.gen_range(4.0..12.0);
    let mut temperature = rng.gen_range(10.0..28.0);
    let mut ecoli_count = rng.gen_range(10..=200);

    if rng.gen_bool(ALERT_CHANCE) {
        match rng.gen_range(0..4) {
            0 if rng.gen_bool(0.5) => ph = rng.gen_range(5.0..6.3),
            0 => ph = rng.gen_range(8.7..9.5),
            1 => dissolved_oxygen = rng.gen_range(2.0..4.5),
            2 => temperature = rng.gen_range(31.0..35.0),
            _ => ecoli_count = rng.gen_range(150..=500),
        }
    }

    WaterQualityReadings {
        ph: round_to(ph, 2),
        dissolved_oxygen: round_to(dissolved_oxygen, 2),
        temperature: round_to(temperature, 1),
        turbidity: round_to(rng.gen_range(1.0..8.0), 2),
        nitrates: round_to(rng.gen_range(1.0..12.0), 2),
        phosphates: round_to(rng.gen_range(0.02..0.15), 3),
        ecoli_count,
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
