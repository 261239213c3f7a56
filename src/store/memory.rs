/// In-process store used by tests, dry-run imports and local demos.
///
/// Single-writer: callers hold `&mut MemoryStore`, so there is nothing to
/// lock. Ids are assigned sequentially from 1, like a database sequence.

use chrono::Utc;

use super::{MeasurementFilter, StoreError, WaterQualityStore};
use crate::model::{Measurement, NewMeasurement, NewWaterBody, WaterBody};

#[derive(Debug, Default)]
pub struct MemoryStore {
    water_bodies: Vec<WaterBody>,
    measurements: Vec<Measurement>,
    next_water_body_id: i64,
    next_measurement_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_water_body_id(&mut self) -> i64 {
        self.next_water_body_id += 1;
        self.next_water_body_id
    }

    fn allocate_measurement_id(&mut self) -> i64 {
        self.next_measurement_id += 1;
        self.next_measurement_id
    }
}

impl WaterQualityStore for MemoryStore {
    fn find_water_body(&mut self, name: &str) -> Result<Option<WaterBody>, StoreError> {
        Ok(self.water_bodies.iter().find(|wb| wb.name == name).cloned())
    }

    fn get_water_body(&mut self, id: i64) -> Result<Option<WaterBody>, StoreError> {
        Ok(self.water_bodies.iter().find(|wb| wb.id == id).cloned())
    }

    fn list_water_bodies(&mut self, active_only: bool) -> Result<Vec<WaterBody>, StoreError> {
        let mut bodies: Vec<WaterBody> = self
            .water_bodies
            .iter()
            .filter(|wb| !active_only || wb.is_active)
            .cloned()
            .collect();
        bodies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(bodies)
    }

    fn create_water_body(&mut self, attrs: NewWaterBody) -> Result<WaterBody, StoreError> {
        let location = attrs.validate()?;
        if self.water_bodies.iter().any(|wb| wb.name == attrs.name) {
            return Err(StoreError::DuplicateName(attrs.name));
        }

        let now = Utc::now();
        let water_body = WaterBody {
            id: self.allocate_water_body_id(),
            name: attrs.name,
            water_body_type: attrs.water_body_type,
            location,
            description: attrs.description,
            regulatory_body: attrs.regulatory_body,
            monitoring_start_date: attrs.monitoring_start_date.unwrap_or_else(|| now.date_naive()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.water_bodies.push(water_body.clone());
        Ok(water_body)
    }

    fn set_water_body_active(&mut self, id: i64, active: bool) -> Result<WaterBody, StoreError> {
        let wb = self
            .water_bodies
            .iter_mut()
            .find(|wb| wb.id == id)
            .ok_or_else(|| StoreError::WaterBodyNotFound(id.to_string()))?;
        wb.is_active = active;
        wb.updated_at = Utc::now();
        Ok(wb.clone())
    }

    fn delete_water_body(&mut self, id: i64) -> Result<bool, StoreError> {
        let before = self.water_bodies.len();
        self.water_bodies.retain(|wb| wb.id != id);
        if self.water_bodies.len() == before {
            return Ok(false);
        }
        self.measurements.retain(|m| m.water_body_id != id);
        Ok(true)
    }

    fn list_measurements(&mut self, filter: &MeasurementFilter) -> Result<Vec<Measurement>, StoreError> {
        let mut rows: Vec<Measurement> = self
            .measurements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.measured_at.cmp(&a.measured_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn count_measurements(&mut self) -> Result<usize, StoreError> {
        Ok(self.measurements.len())
    }

    fn create_measurement(&mut self, attrs: NewMeasurement) -> Result<Measurement, StoreError> {
        let sample_location = attrs.validate()?;
        if !self.water_bodies.iter().any(|wb| wb.id == attrs.water_body_id) {
            return Err(StoreError::WaterBodyNotFound(attrs.water_body_id.to_string()));
        }

        let measurement = Measurement {
            id: self.allocate_measurement_id(),
            water_body_id: attrs.water_body_id,
            measured_at: attrs.measured_at,
            readings: attrs.readings,
            sample_location,
            measured_by: attrs.measured_by,
            notes: attrs.notes,
            created_at: Utc::now(),
        };
        self.measurements.push(measurement.clone());
        Ok(measurement)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
