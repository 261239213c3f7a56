//! Data access for water bodies and measurements.
//!
//! `WaterQualityStore` is the only way the rest of the service touches
//! persistence. Two implementations ship: `MemoryStore` for tests and dry
//! runs, and `PostgresStore` for the deployed service. Validation happens
//! here, at the write boundary, so nothing downstream ever sees a reading
//! that fails its structural range check.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{Measurement, NewMeasurement, NewWaterBody, ValidationError, WaterBody};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("a water body named '{0}' already exists")]
    DuplicateName(String),

    #[error("water body not found: {0}")]
    WaterBodyNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] ::postgres::Error),
}

// ---------------------------------------------------------------------------
// Query filter
// ---------------------------------------------------------------------------

/// Filter for `list_measurements`. All bounds are inclusive; `None` means
/// unbounded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementFilter {
    pub water_body_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Cap on the number of rows returned (most recent first).
    pub limit: Option<usize>,
}

impl MeasurementFilter {
    pub fn for_water_body(water_body_id: i64) -> Self {
        Self {
            water_body_id: Some(water_body_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, m: &Measurement) -> bool {
        self.water_body_id.is_none_or(|id| m.water_body_id == id)
            && self.start.is_none_or(|start| m.measured_at >= start)
            && self.end.is_none_or(|end| m.measured_at <= end)
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

pub trait WaterQualityStore {
    fn find_water_body(&mut self, name: &str) -> Result<Option<WaterBody>, StoreError>;

    fn get_water_body(&mut self, id: i64) -> Result<Option<WaterBody>, StoreError>;

    /// Water bodies ordered by name.
    fn list_water_bodies(&mut self, active_only: bool) -> Result<Vec<WaterBody>, StoreError>;

    /// Fails with `DuplicateName` if the name is taken.
    fn create_water_body(&mut self, attrs: NewWaterBody) -> Result<WaterBody, StoreError>;

    /// Soft (de)activation. Returns `WaterBodyNotFound` for an unknown id.
    fn set_water_body_active(&mut self, id: i64, active: bool) -> Result<WaterBody, StoreError>;

    /// Removes a water body together with all of its measurements.
    /// Returns whether anything was deleted.
    fn delete_water_body(&mut self, id: i64) -> Result<bool, StoreError>;

    /// Measurements matching `filter`, most recent first (ties: newest id first).
    fn list_measurements(&mut self, filter: &MeasurementFilter) -> Result<Vec<Measurement>, StoreError>;

    fn count_measurements(&mut self) -> Result<usize, StoreError>;

    /// Validates and stores a measurement. The referenced water body must exist.
    fn create_measurement(&mut self, attrs: NewMeasurement) -> Result<Measurement, StoreError>;

    /// Looks up a water body by name, creating it from `attrs` if absent.
    /// The flag is `true` when a new row was created.
    fn get_or_create_water_body(&mut self, attrs: NewWaterBody) -> Result<(WaterBody, bool), StoreError> {
        match self.find_water_body(&attrs.name)? {
            Some(existing) => Ok((existing, false)),
            None => self.create_water_body(attrs).map(|wb| (wb, true)),
        }
    }

    /// Measurements paired with their water body, in `list_measurements` order.
    fn list_measurements_with_water_bodies(
        &mut self,
        filter: &MeasurementFilter,
    ) -> Result<Vec<(Measurement, WaterBody)>, StoreError> {
        let measurements = self.list_measurements(filter)?;
        let mut water_bodies: HashMap<i64, WaterBody> = HashMap::new();
        let mut rows = Vec::with_capacity(measurements.len());

        for m in measurements {
            if !water_bodies.contains_key(&m.water_body_id) {
                let wb = self
                    .get_water_body(m.water_body_id)?
                    .ok_or_else(|| StoreError::WaterBodyNotFound(m.water_body_id.to_string()))?;
                water_bodies.insert(m.water_body_id, wb);
            }
            let wb = water_bodies[&m.water_body_id].clone();
            rows.push((m, wb));
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
