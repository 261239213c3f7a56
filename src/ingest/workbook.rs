/// Bulk loader for field-data workbooks.
///
/// Reads an XLSX file with two sheets:
///
/// - `WaterBodies`: name, type, latitude, longitude, description, regulatory body
/// - `Measurements`: water body name, date, pH, dissolved oxygen, temperature,
///   turbidity, nitrates, phosphates, E. coli, measured by, sample latitude,
///   sample longitude, notes
///
/// The first row of each sheet is a header and is skipped. Water bodies are
/// get-or-create, so re-running an import does not duplicate them.
/// A measurement row that names an unknown water body, fails validation, or
/// has an unreadable cell is skipped and recorded in the summary; only a
/// database failure aborts the run.

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use thiserror::Error;

use crate::alert::thresholds::evaluate;
use crate::logging::{self, Component};
use crate::model::{NewMeasurement, NewWaterBody, WaterBodyType, WaterQualityReadings};
use crate::standards::StandardsRegistry;
use crate::store::{StoreError, WaterQualityStore};

pub const WATER_BODIES_SHEET: &str = "WaterBodies";
pub const MEASUREMENTS_SHEET: &str = "Measurements";

// ============================================================================
// Errors and results
// ============================================================================

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open workbook: {0}")]
    Open(#[from] calamine::XlsxError),

    #[error("workbook has no '{0}' sheet")]
    MissingSheet(&'static str),

    #[error("import aborted: {0}")]
    Store(#[from] StoreError),
}

/// A row that was not loaded, with the 1-based spreadsheet row number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub sheet: &'static str,
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub water_bodies_created: usize,
    pub water_bodies_existing: usize,
    pub measurements_total: usize,
    pub measurements_created: usize,
    pub measurements_with_alerts: usize,
    pub skipped: Vec<SkippedRow>,
}

impl ImportSummary {
    fn skip(&mut self, sheet: &'static str, row: usize, reason: impl Into<String>) {
        let reason = reason.into();
        logging::warn(Component::Import, Some(&format!("{} row {}", sheet, row)), &reason);
        self.skipped.push(SkippedRow { sheet, row, reason });
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Opens `path` and imports it into `store`.
pub fn import_path<S: WaterQualityStore + ?Sized>(
    path: &Path,
    store: &mut S,
    standards: &StandardsRegistry,
) -> Result<ImportSummary, ImportError> {
    logging::info(Component::Import, None, &format!("Loading data from: {}", path.display()));
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    import_workbook(&mut workbook, store, standards)
}

pub fn import_workbook<R: Read + Seek, S: WaterQualityStore + ?Sized>(
    workbook: &mut Xlsx<R>,
    store: &mut S,
    standards: &StandardsRegistry,
) -> Result<ImportSummary, ImportError> {
    let water_bodies = workbook
        .worksheet_range(WATER_BODIES_SHEET)
        .map_err(|_| ImportError::MissingSheet(WATER_BODIES_SHEET))?;
    let measurements = workbook
        .worksheet_range(MEASUREMENTS_SHEET)
        .map_err(|_| ImportError::MissingSheet(MEASUREMENTS_SHEET))?;

    let mut summary = ImportSummary::default();

    for (index, row) in water_bodies.rows().enumerate().skip(1) {
        load_water_body(row, index + 1, store, &mut summary)?;
    }

    let mut ids_by_name: HashMap<String, Option<i64>> = HashMap::new();
    for (index, row) in measurements.rows().enumerate().skip(1) {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        summary.measurements_total += 1;
        load_measurement(row, index + 1, store, standards, &mut ids_by_name, &mut summary)?;
    }

    logging::log_import_summary(
        summary.measurements_total,
        summary.measurements_created,
        summary.skipped.iter().filter(|s| s.sheet == MEASUREMENTS_SHEET).count(),
        summary.measurements_with_alerts,
    );
    Ok(summary)
}

// ============================================================================
// Row loaders
// ============================================================================

fn load_water_body<S: WaterQualityStore + ?Sized>(
    row: &[Data],
    row_num: usize,
    store: &mut S,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let name = cell_text(row.first());
    if name.is_empty() {
        return Ok(());
    }

    let attrs = match parse_water_body(row, name) {
        Ok(attrs) => attrs,
        Err(reason) => {
            summary.skip(WATER_BODIES_SHEET, row_num, reason);
            return Ok(());
        }
    };

    match store.get_or_create_water_body(attrs) {
        Ok((wb, true)) => {
            logging::info(Component::Import, Some(&wb.name), "created water body");
            summary.water_bodies_created += 1;
        }
        Ok((wb, false)) => {
            logging::debug(Component::Import, Some(&wb.name), "water body already exists");
            summary.water_bodies_existing += 1;
        }
        Err(StoreError::Database(e)) => return Err(StoreError::Database(e).into()),
        Err(e) => summary.skip(WATER_BODIES_SHEET, row_num, e.to_string()),
    }
    Ok(())
}

fn load_measurement<S: WaterQualityStore + ?Sized>(
    row: &[Data],
    row_num: usize,
    store: &mut S,
    standards: &StandardsRegistry,
    ids_by_name: &mut HashMap<String, Option<i64>>,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    let name = cell_text(row.first());

    let water_body_id = match ids_by_name.get(&name) {
        Some(id) => *id,
        None => {
            let id = store.find_water_body(&name)?.map(|wb| wb.id);
            ids_by_name.insert(name.clone(), id);
            id
        }
    };
    let Some(water_body_id) = water_body_id else {
        summary.skip(MEASUREMENTS_SHEET, row_num, format!("Water body not found: {}", name));
        return Ok(());
    };

    let attrs = match parse_measurement(row, water_body_id) {
        Ok(attrs) => attrs,
        Err(reason) => {
            summary.skip(MEASUREMENTS_SHEET, row_num, reason);
            return Ok(());
        }
    };

    let measurement = match store.create_measurement(attrs) {
        Ok(m) => m,
        Err(StoreError::Database(e)) => return Err(StoreError::Database(e).into()),
        Err(e) => {
            logging::log_store_failure(&name, &format!("row {}: create measurement", row_num), &e);
            summary.skipped.push(SkippedRow {
                sheet: MEASUREMENTS_SHEET,
                row: row_num,
                reason: e.to_string(),
            });
            return Ok(());
        }
    };
    summary.measurements_created += 1;

    let evaluation = evaluate(&measurement.readings, standards);
    if evaluation.has_alerts() {
        summary.measurements_with_alerts += 1;
        let preview: Vec<&str> = evaluation.alerts.iter().take(2).map(String::as_str).collect();
        logging::warn(
            Component::Import,
            Some(&name),
            &format!(
                "{} - {} alert(s): {}",
                measurement.measured_at.format("%Y-%m-%d"),
                evaluation.alerts.len(),
                preview.join(", ")
            ),
        );
    }
    Ok(())
}

// ============================================================================
// Row parsing
// ============================================================================

fn parse_water_body(row: &[Data], name: String) -> Result<NewWaterBody, String> {
    let type_text = cell_text(row.get(1));
    let water_body_type: WaterBodyType = type_text.parse().map_err(|e: crate::model::ValidationError| e.to_string())?;
    Ok(NewWaterBody {
        name,
        water_body_type,
        latitude: cell_f64(row.get(2), "latitude")?,
        longitude: cell_f64(row.get(3), "longitude")?,
        description: cell_text(row.get(4)),
        regulatory_body: cell_text(row.get(5)),
        monitoring_start_date: None,
    })
}

fn parse_measurement(row: &[Data], water_body_id: i64) -> Result<NewMeasurement, String> {
    Ok(NewMeasurement {
        water_body_id,
        measured_at: cell_datetime(row.get(1))?,
        readings: WaterQualityReadings {
            ph: cell_f64(row.get(2), "ph")?,
            dissolved_oxygen: cell_f64(row.get(3), "dissolved_oxygen")?,
            temperature: cell_f64(row.get(4), "temperature")?,
            turbidity: cell_f64(row.get(5), "turbidity")?,
            nitrates: cell_f64(row.get(6), "nitrates")?,
            phosphates: cell_f64(row.get(7), "phosphates")?,
            ecoli_count: cell_count(row.get(8), "ecoli_count")?,
        },
        measured_by: cell_text(row.get(9)),
        sample_latitude: cell_opt_f64(row.get(10), "sample_latitude")?,
        sample_longitude: cell_opt_f64(row.get(11), "sample_longitude")?,
        notes: cell_text(row.get(12)),
    })
}

// ============================================================================
// Cell helpers
// ============================================================================

fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

fn cell_opt_f64(cell: Option<&Data>, field: &str) -> Result<Option<f64>, String> {
    match cell {
        None | Some(Data::Empty) => Ok(None),
        Some(Data::Float(v)) => Ok(Some(*v)),
        Some(Data::Int(v)) => Ok(Some(*v as f64)),
        Some(Data::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Data::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{}: not a number: '{}'", field, s)),
        Some(other) => Err(format!("{}: not a number: '{}'", field, other)),
    }
}

fn cell_f64(cell: Option<&Data>, field: &str) -> Result<f64, String> {
    cell_opt_f64(cell, field)?.ok_or_else(|| format!("{}: missing value", field))
}

fn cell_count(cell: Option<&Data>, field: &str) -> Result<i32, String> {
    let value = cell_f64(cell, field)?;
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return Err(format!("{}: expected a whole number, got {}", field, value));
    }
    Ok(value as i32)
}

/// Accepts native Excel dates, `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and
/// RFC 3339 text. Times without an offset are taken as UTC.
fn cell_datetime(cell: Option<&Data>) -> Result<DateTime<Utc>, String> {
    match cell {
        Some(Data::DateTime(dt)) => dt
            .as_datetime()
            .map(|naive| naive.and_utc())
            .ok_or_else(|| "date: invalid spreadsheet date".to_string()),
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) => parse_date_text(s.trim()),
        None | Some(Data::Empty) => Err("date: missing value".to_string()),
        Some(other) => Err(format!("date: unreadable value '{}'", other)),
    }
}

fn parse_date_text(text: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("date: cannot parse '{}'", text))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MeasurementFilter, MemoryStore};
    use chrono::TimeZone;
    use rust_xlsxwriter::{Workbook, Worksheet};
    use std::io::Cursor;

    enum V<'a> {
        S(&'a str),
        N(f64),
        E,
    }

    fn write_rows(sheet: &mut Worksheet, rows: &[Vec<V>]) {
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match value {
                    V::S(s) => {
                        sheet.write_string(r, c, *s).unwrap();
                    }
                    V::N(n) => {
                        sheet.write_number(r, c, *n).unwrap();
                    }
                    V::E => {}
                }
            }
        }
    }

    fn measurement_row<'a>(name: &'a str, date: &'a str, ph: f64, ecoli: f64) -> Vec<V<'a>> {
        vec![
            V::S(name),
            V::S(date),
            V::N(ph),
            V::N(8.0),
            V::N(20.0),
            V::N(3.0),
            V::N(5.0),
            V::N(0.05),
            V::N(ecoli),
            V::S("Field Team"),
            V::E,
            V::E,
            V::S("routine"),
        ]
    }

    fn test_workbook(measurements: Vec<Vec<V>>) -> Xlsx<Cursor<Vec<u8>>> {
        let mut bodies = Worksheet::new();
        bodies.set_name(WATER_BODIES_SHEET).unwrap();
        write_rows(
            &mut bodies,
            &[
                vec![V::S("Name"), V::S("Type"), V::S("Lat"), V::S("Lon"), V::S("Description"), V::S("Regulator")],
                vec![
                    V::S("Lake Michigan"),
                    V::S("LAKE"),
                    V::N(42.3601),
                    V::N(-87.0073),
                    V::S("Great Lake"),
                    V::S("EPA Region 5"),
                ],
                vec![
                    V::S("Chesapeake Bay"),
                    V::S("OCEAN"),
                    V::N(38.3235),
                    V::N(-76.4813),
                    V::S("Estuary"),
                    V::S("EPA Region 3"),
                ],
            ],
        );

        let mut header = vec![V::S("Water Body"), V::S("Date")];
        header.extend((0..11).map(|_| V::S("col")));
        let mut rows = vec![header];
        rows.extend(measurements);

        let mut meas = Worksheet::new();
        meas.set_name(MEASUREMENTS_SHEET).unwrap();
        write_rows(&mut meas, &rows);

        let mut workbook = Workbook::new();
        workbook.push_worksheet(bodies);
        workbook.push_worksheet(meas);
        let bytes = workbook.save_to_buffer().unwrap();
        Xlsx::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_import_loads_water_bodies_and_measurements() {
        let mut wb = test_workbook(vec![
            measurement_row("Lake Michigan", "2024-05-01", 7.5, 50.0),
            measurement_row("Chesapeake Bay", "2024-05-02 13:45:00", 5.0, 50.0),
        ]);
        let mut store = MemoryStore::new();
        let summary = import_workbook(&mut wb, &mut store, &StandardsRegistry::default()).unwrap();

        assert_eq!(summary.water_bodies_created, 2);
        assert_eq!(summary.measurements_total, 2);
        assert_eq!(summary.measurements_created, 2);
        assert_eq!(summary.measurements_with_alerts, 1);
        assert!(summary.skipped.is_empty());

        let bay = store.find_water_body("Chesapeake Bay").unwrap().unwrap();
        assert_eq!(bay.water_body_type, WaterBodyType::Ocean);
        let rows = store.list_measurements(&MeasurementFilter::for_water_body(bay.id)).unwrap();
        assert_eq!(rows[0].measured_at, Utc.with_ymd_and_hms(2024, 5, 2, 13, 45, 0).unwrap());
        assert_eq!(rows[0].notes, "routine");
    }

    #[test]
    fn test_unknown_water_body_is_skipped_not_fatal() {
        let mut wb = test_workbook(vec![
            measurement_row("Lake Nowhere", "2024-05-01", 7.5, 50.0),
            measurement_row("Lake Michigan", "2024-05-01", 7.5, 50.0),
        ]);
        let mut store = MemoryStore::new();
        let summary = import_workbook(&mut wb, &mut store, &StandardsRegistry::default()).unwrap();

        assert_eq!(summary.measurements_created, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].row, 2);
        assert!(summary.skipped[0].reason.contains("Lake Nowhere"));
    }

    #[test]
    fn test_invalid_and_unparseable_rows_are_skipped() {
        let mut wb = test_workbook(vec![
            measurement_row("Lake Michigan", "2024-05-01", 15.0, 50.0),
            measurement_row("Lake Michigan", "yesterday", 7.5, 50.0),
            measurement_row("Lake Michigan", "2024-05-03", 7.5, 12.5),
            measurement_row("Lake Michigan", "2024-05-04", 7.5, 50.0),
        ]);
        let mut store = MemoryStore::new();
        let summary = import_workbook(&mut wb, &mut store, &StandardsRegistry::default()).unwrap();

        assert_eq!(summary.measurements_total, 4);
        assert_eq!(summary.measurements_created, 1);
        let skipped_rows: Vec<usize> = summary.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped_rows, vec![2, 3, 4]);
        assert!(summary.skipped[0].reason.contains("ph"));
        assert!(summary.skipped[1].reason.contains("date"));
        assert!(summary.skipped[2].reason.contains("whole number"));
    }

    #[test]
    fn test_overlong_recorder_name_is_skipped_not_fatal() {
        let long_name = "m".repeat(crate::model::MAX_NAME_LEN + 1);
        let mut overlong = measurement_row("Lake Michigan", "2024-05-01", 7.5, 50.0);
        overlong[9] = V::S(&long_name);
        let mut wb = test_workbook(vec![overlong, measurement_row("Lake Michigan", "2024-05-02", 7.5, 50.0)]);

        let mut store = MemoryStore::new();
        let summary = import_workbook(&mut wb, &mut store, &StandardsRegistry::default()).unwrap();

        assert_eq!(summary.measurements_created, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].row, 2);
        assert!(summary.skipped[0].reason.contains("measured_by"));
    }

    #[test]
    fn test_reimport_does_not_duplicate_water_bodies() {
        let mut store = MemoryStore::new();
        let standards = StandardsRegistry::default();
        import_workbook(&mut test_workbook(vec![]), &mut store, &standards).unwrap();
        let summary = import_workbook(&mut test_workbook(vec![]), &mut store, &standards).unwrap();
        assert_eq!(summary.water_bodies_created, 0);
        assert_eq!(summary.water_bodies_existing, 2);
        assert_eq!(store.list_water_bodies(false).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_sheet_is_an_error() {
        let mut workbook = Workbook::new();
        let mut sheet = Worksheet::new();
        sheet.set_name("Other").unwrap();
        workbook.push_worksheet(sheet);
        let bytes = workbook.save_to_buffer().unwrap();
        let mut xlsx: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();

        let result = import_workbook(&mut xlsx, &mut MemoryStore::new(), &StandardsRegistry::default());
        assert!(matches!(result, Err(ImportError::MissingSheet(WATER_BODIES_SHEET))));
    }

    #[test]
    fn test_parse_date_text_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date_text("2024-05-01").unwrap(), midnight);
        assert_eq!(parse_date_text("2024-05-01 00:00").unwrap(), midnight);
        assert_eq!(parse_date_text("2024-05-01T05:00:00+05:00").unwrap(), midnight);
        assert!(parse_date_text("05/01/2024").is_err());
    }

    #[test]
    fn test_cell_count_rejects_fractions() {
        assert_eq!(cell_count(Some(&Data::Float(50.0)), "ecoli_count"), Ok(50));
        assert!(cell_count(Some(&Data::Float(50.5)), "ecoli_count").is_err());
        assert!(cell_count(Some(&Data::Empty), "ecoli_count").is_err());
    }
}
