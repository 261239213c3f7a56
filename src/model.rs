/// Core data types for the AquaWatch water-quality service.
///
/// This module defines the shared domain model imported by all other modules:
/// water bodies, measurements, the seven monitored parameters, and the
/// structural validation every measurement must pass before it is stored.
/// Regulatory thresholds live in `standards`; compliance is judged in
/// `alert::thresholds`, never here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Water body category
// ---------------------------------------------------------------------------

/// Category of a monitored water body.
///
/// The upper-case code (`LAKE`, `OCEAN`, ...) is what gets stored and what
/// import workbooks and config files use; `label()` is what reports show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaterBodyType {
    Lake,
    River,
    Reservoir,
    Pond,
    Stream,
    Ocean,
}

impl WaterBodyType {
    pub const ALL: [WaterBodyType; 6] = [
        WaterBodyType::Lake,
        WaterBodyType::River,
        WaterBodyType::Reservoir,
        WaterBodyType::Pond,
        WaterBodyType::Stream,
        WaterBodyType::Ocean,
    ];

    pub fn code(self) -> &'static str {
        match self {
            WaterBodyType::Lake => "LAKE",
            WaterBodyType::River => "RIVER",
            WaterBodyType::Reservoir => "RESERVOIR",
            WaterBodyType::Pond => "POND",
            WaterBodyType::Stream => "STREAM",
            WaterBodyType::Ocean => "OCEAN",
        }
    }

    /// Human-readable label used in exports and listings.
    pub fn label(self) -> &'static str {
        match self {
            WaterBodyType::Lake => "Lake",
            WaterBodyType::River => "River",
            WaterBodyType::Reservoir => "Reservoir",
            WaterBodyType::Pond => "Pond",
            WaterBodyType::Stream => "Stream",
            WaterBodyType::Ocean => "Ocean/Bay",
        }
    }
}

impl fmt::Display for WaterBodyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for WaterBodyType {
    type Err = ValidationError;

    /// Accepts either the storage code or the display label, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        WaterBodyType::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(wanted) || t.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::new("water_body_type", format!("unknown water body type '{}'", wanted)))
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// WGS84 position, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        check_range("latitude", latitude, -90.0, 90.0)?;
        check_range("longitude", longitude, -180.0, 180.0)?;
        Ok(Self { latitude, longitude })
    }
}

// ---------------------------------------------------------------------------
// Water bodies
// ---------------------------------------------------------------------------

/// A monitored lake, river, reservoir, etc.
///
/// Water bodies are never deleted automatically; operators deactivate them
/// through `is_active`. Deleting one removes all its measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterBody {
    pub id: i64,
    pub name: String,
    pub water_body_type: WaterBodyType,
    pub location: GeoPoint,
    pub description: String,
    /// EPA region or local authority.
    pub regulatory_body: String,
    pub monitoring_start_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for WaterBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.water_body_type.label())
    }
}

/// Attributes for creating a water body. Validated by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWaterBody {
    pub name: String,
    pub water_body_type: WaterBodyType,
    pub latitude: f64,
    pub longitude: f64,
    pub description: String,
    pub regulatory_body: String,
    /// Defaults to the creation date when absent.
    pub monitoring_start_date: Option<NaiveDate>,
}

impl NewWaterBody {
    pub fn validate(&self) -> Result<GeoPoint, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "must not be empty"));
        }
        check_max_len("name", &self.name, MAX_NAME_LEN)?;
        check_max_len("regulatory_body", &self.regulatory_body, MAX_NAME_LEN)?;
        GeoPoint::new(self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// The seven water-quality parameters of one field sample.
///
/// Units: dissolved oxygen, nitrates and phosphates in mg/L; temperature in
/// °C; turbidity in NTU; E. coli in CFU/100mL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityReadings {
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub temperature: f64,
    pub turbidity: f64,
    pub nitrates: f64,
    pub phosphates: f64,
    pub ecoli_count: i32,
}

impl WaterQualityReadings {
    /// Structural range checks. These are independent of (and looser than)
    /// the regulatory thresholds in `StandardsRegistry`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("ph", self.ph, 0.0, 14.0)?;
        check_min("dissolved_oxygen", self.dissolved_oxygen, 0.0)?;
        check_finite("temperature", self.temperature)?;
        check_min("turbidity", self.turbidity, 0.0)?;
        check_min("nitrates", self.nitrates, 0.0)?;
        check_min("phosphates", self.phosphates, 0.0)?;
        if self.ecoli_count < 0 {
            return Err(ValidationError::new(
                "ecoli_count",
                format!("must be at least 0, got {}", self.ecoli_count),
            ));
        }
        Ok(())
    }
}

/// One stored field sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub water_body_id: i64,
    pub measured_at: DateTime<Utc>,
    pub readings: WaterQualityReadings,
    /// Where the sample was actually taken, when it differs from the
    /// water body's reference position.
    pub sample_location: Option<GeoPoint>,
    pub measured_by: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Measurement {
    /// Sample position if recorded, otherwise the water body's position.
    pub fn location_or(&self, water_body: &WaterBody) -> GeoPoint {
        self.sample_location.unwrap_or(water_body.location)
    }

    /// `"<water body> - YYYY-MM-DD HH:MM"`, used in listings and logs.
    pub fn label(&self, water_body: &WaterBody) -> String {
        format!("{} - {}", water_body.name, self.measured_at.format("%Y-%m-%d %H:%M"))
    }
}

/// Attributes for recording a measurement. Validated by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub water_body_id: i64,
    pub measured_at: DateTime<Utc>,
    pub readings: WaterQualityReadings,
    pub sample_latitude: Option<f64>,
    pub sample_longitude: Option<f64>,
    pub measured_by: String,
    pub notes: String,
}

impl NewMeasurement {
    /// Validates every numeric attribute and resolves the sample position.
    ///
    /// Each supplied coordinate is range-checked, but a sample position is
    /// only recorded when both latitude and longitude are present.
    pub fn validate(&self) -> Result<Option<GeoPoint>, ValidationError> {
        self.readings.validate()?;
        check_max_len("measured_by", &self.measured_by, MAX_NAME_LEN)?;
        if let Some(lat) = self.sample_latitude {
            check_range("sample_latitude", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = self.sample_longitude {
            check_range("sample_longitude", lon, -180.0, 180.0)?;
        }
        match (self.sample_latitude, self.sample_longitude) {
            (Some(lat), Some(lon)) => Ok(Some(GeoPoint { latitude: lat, longitude: lon })),
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Column width of `name`, `regulatory_body` and `measured_by` in the schema.
pub const MAX_NAME_LEN: usize = 200;

/// A value failed its structural range check and cannot be stored.
///
/// This is distinct from a compliance alert: an out-of-standard but
/// physically plausible reading is stored and flagged, never rejected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new(field, format!("must be a finite number, got {}", value)))
    }
}

fn check_min(field: &'static str, value: f64, min: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if value < min {
        return Err(ValidationError::new(field, format!("must be at least {}, got {}", min, value)));
    }
    Ok(())
}

/// Counts characters, which is how `VARCHAR(n)` measures length.
fn check_max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::new(field, format!("must be at most {} characters, got {}", max, len)));
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    check_min(field, value, min)?;
    if value > max {
        return Err(ValidationError::new(field, format!("must be at most {}, got {}", max, value)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
