/// PostgreSQL-backed store.
///
/// Uses the blocking `postgres` client; the service is single-writer so one
/// connection per process is enough. Schema: `sql/001_aquawatch_schema.sql`.
/// Cascading deletes are done by the `ON DELETE CASCADE` foreign key.

use chrono::{DateTime, NaiveDate, Utc};
use postgres::error::SqlState;
use postgres::types::ToSql;
use postgres::{Client, Row};

use super::{MeasurementFilter, StoreError, WaterQualityStore};
use crate::model::{
    GeoPoint, Measurement, NewMeasurement, NewWaterBody, WaterBody, WaterBodyType, WaterQualityReadings,
};

const WATER_BODY_COLUMNS: &str = "id, name, water_body_type, latitude, longitude, description, \
     regulatory_body, monitoring_start_date, is_active, created_at, updated_at";

const MEASUREMENT_COLUMNS: &str = "id, water_body_id, measured_at, ph, dissolved_oxygen, temperature, \
     turbidity, nitrates, phosphates, ecoli_count, sample_latitude, sample_longitude, \
     measured_by, notes, created_at";

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn into_inner(self) -> Client {
        self.client
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn water_body_from_row(row: &Row) -> Result<WaterBody, StoreError> {
    let type_code: String = row.get("water_body_type");
    Ok(WaterBody {
        id: row.get("id"),
        name: row.get("name"),
        water_body_type: type_code.parse::<WaterBodyType>()?,
        location: GeoPoint {
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
        },
        description: row.get("description"),
        regulatory_body: row.get("regulatory_body"),
        monitoring_start_date: row.get::<_, NaiveDate>("monitoring_start_date"),
        is_active: row.get("is_active"),
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
        updated_at: row.get::<_, DateTime<Utc>>("updated_at"),
    })
}

fn measurement_from_row(row: &Row) -> Measurement {
    let sample_latitude: Option<f64> = row.get("sample_latitude");
    let sample_longitude: Option<f64> = row.get("sample_longitude");
    Measurement {
        id: row.get("id"),
        water_body_id: row.get("water_body_id"),
        measured_at: row.get::<_, DateTime<Utc>>("measured_at"),
        readings: WaterQualityReadings {
            ph: row.get("ph"),
            dissolved_oxygen: row.get("dissolved_oxygen"),
            temperature: row.get("temperature"),
            turbidity: row.get("turbidity"),
            nitrates: row.get("nitrates"),
            phosphates: row.get("phosphates"),
            ecoli_count: row.get("ecoli_count"),
        },
        sample_location: match (sample_latitude, sample_longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
            _ => None,
        },
        measured_by: row.get("measured_by"),
        notes: row.get("notes"),
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
    }
}

fn is_unique_violation(err: &postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

fn is_foreign_key_violation(err: &postgres::Error) -> bool {
    err.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
}

/// Builds the WHERE/LIMIT tail for a measurement query. Placeholders are
/// numbered in the order parameters are pushed.
fn measurement_query(filter: &MeasurementFilter) -> (String, Vec<Box<dyn ToSql + Sync>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql + Sync>> = Vec::new();

    if let Some(id) = filter.water_body_id {
        params.push(Box::new(id));
        clauses.push(format!("water_body_id = ${}", params.len()));
    }
    if let Some(start) = filter.start {
        params.push(Box::new(start));
        clauses.push(format!("measured_at >= ${}", params.len()));
    }
    if let Some(end) = filter.end {
        params.push(Box::new(end));
        clauses.push(format!("measured_at <= ${}", params.len()));
    }

    let mut sql = format!("SELECT {} FROM measurements", MEASUREMENT_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY measured_at DESC, id DESC");
    if let Some(limit) = filter.limit {
        params.push(Box::new(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", params.len()));
    }
    (sql, params)
}

// ---------------------------------------------------------------------------
// Facade implementation
// ---------------------------------------------------------------------------

impl WaterQualityStore for PostgresStore {
    fn find_water_body(&mut self, name: &str) -> Result<Option<WaterBody>, StoreError> {
        let sql = format!("SELECT {} FROM water_bodies WHERE name = $1", WATER_BODY_COLUMNS);
        self.client
            .query_opt(&sql, &[&name])?
            .map(|row| water_body_from_row(&row))
            .transpose()
    }

    fn get_water_body(&mut self, id: i64) -> Result<Option<WaterBody>, StoreError> {
        let sql = format!("SELECT {} FROM water_bodies WHERE id = $1", WATER_BODY_COLUMNS);
        self.client
            .query_opt(&sql, &[&id])?
            .map(|row| water_body_from_row(&row))
            .transpose()
    }

    fn list_water_bodies(&mut self, active_only: bool) -> Result<Vec<WaterBody>, StoreError> {
        let sql = format!(
            "SELECT {} FROM water_bodies WHERE is_active OR NOT $1 ORDER BY name",
            WATER_BODY_COLUMNS
        );
        self.client
            .query(&sql, &[&active_only])?
            .iter()
            .map(water_body_from_row)
            .collect()
    }

    fn create_water_body(&mut self, attrs: NewWaterBody) -> Result<WaterBody, StoreError> {
        let location = attrs.validate()?;
        let start_date = attrs.monitoring_start_date.unwrap_or_else(|| Utc::now().date_naive());
        let sql = format!(
            "INSERT INTO water_bodies
                 (name, water_body_type, latitude, longitude, description, regulatory_body, monitoring_start_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            WATER_BODY_COLUMNS
        );
        let result = self.client.query_one(
            &sql,
            &[
                &attrs.name,
                &attrs.water_body_type.code(),
                &location.latitude,
                &location.longitude,
                &attrs.description,
                &attrs.regulatory_body,
                &start_date,
            ],
        );
        match result {
            Ok(row) => water_body_from_row(&row),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateName(attrs.name)),
            Err(e) => Err(e.into()),
        }
    }

    fn set_water_body_active(&mut self, id: i64, active: bool) -> Result<WaterBody, StoreError> {
        let sql = format!(
            "UPDATE water_bodies SET is_active = $2, updated_at = now() WHERE id = $1 RETURNING {}",
            WATER_BODY_COLUMNS
        );
        match self.client.query_opt(&sql, &[&id, &active])? {
            Some(row) => water_body_from_row(&row),
            None => Err(StoreError::WaterBodyNotFound(id.to_string())),
        }
    }

    fn delete_water_body(&mut self, id: i64) -> Result<bool, StoreError> {
        let deleted = self.client.execute("DELETE FROM water_bodies WHERE id = $1", &[&id])?;
        Ok(deleted > 0)
    }

    fn list_measurements(&mut self, filter: &MeasurementFilter) -> Result<Vec<Measurement>, StoreError> {
        let (sql, params) = measurement_query(filter);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();
        let rows = self.client.query(&sql, &refs)?;
        Ok(rows.iter().map(measurement_from_row).collect())
    }

    fn count_measurements(&mut self) -> Result<usize, StoreError> {
        let row = self.client.query_one("SELECT COUNT(*) FROM measurements", &[])?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    fn create_measurement(&mut self, attrs: NewMeasurement) -> Result<Measurement, StoreError> {
        let sample_location = attrs.validate()?;
        let sample_latitude = sample_location.map(|p| p.latitude);
        let sample_longitude = sample_location.map(|p| p.longitude);
        let r = &attrs.readings;

        let sql = format!(
            "INSERT INTO measurements
                 (water_body_id, measured_at, ph, dissolved_oxygen, temperature, turbidity,
                  nitrates, phosphates, ecoli_count, sample_latitude, sample_longitude, measured_by, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {}",
            MEASUREMENT_COLUMNS
        );
        let result = self.client.query_one(
            &sql,
            &[
                &attrs.water_body_id,
                &attrs.measured_at,
                &r.ph,
                &r.dissolved_oxygen,
                &r.temperature,
                &r.turbidity,
                &r.nitrates,
                &r.phosphates,
                &r.ecoli_count,
                &sample_latitude,
                &sample_longitude,
                &attrs.measured_by,
                &attrs.notes,
            ],
        );
        match result {
            Ok(row) => Ok(measurement_from_row(&row)),
            Err(e) if is_foreign_key_violation(&e) => {
                Err(StoreError::WaterBodyNotFound(attrs.water_body_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
