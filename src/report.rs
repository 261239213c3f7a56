//! Regulatory compliance spreadsheet.
//!
//! `build_report` turns a sequence of measurements (each paired with its
//! water body) into an XLSX workbook with three sheets:
//!
//! - `Water Quality Data`: one header row plus one row per measurement, in
//!   input order. The header labels and their order are relied on by
//!   downstream regulatory pipelines and must not change.
//! - `Summary`: export time and compliant / non-compliant counts.
//! - `EPA Standards`: the thresholds the rows were judged against.
//!
//! Building is split in two so the cell values can be tested without
//! parsing XLSX: `export_row` / `summarize` produce plain values, and the
//! `write_*` functions lay them out.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use serde::Serialize;
use thiserror::Error;

use crate::alert::thresholds::{evaluate, STATUS_COMPLIANT};
use crate::model::{Measurement, WaterBody, WaterQualityReadings};
use crate::standards::StandardsRegistry;

pub const DATA_SHEET: &str = "Water Quality Data";
pub const SUMMARY_SHEET: &str = "Summary";
pub const STANDARDS_SHEET: &str = "EPA Standards";

/// Data sheet header row, in column order.
pub const HEADERS: [&str; 16] = [
    "Water Body",
    "Water Body Type",
    "Latitude",
    "Longitude",
    "Measurement Date/Time",
    "Measured By",
    "pH",
    "Dissolved Oxygen (mg/L)",
    "Temperature (°C)",
    "Turbidity (NTU)",
    "Nitrates (mg/L)",
    "Phosphates (mg/L)",
    "E. coli (CFU/100mL)",
    "EPA Compliance Status",
    "Alerts",
    "Notes",
];

/// Zero-based column of "EPA Compliance Status".
pub const STATUS_COLUMN: u16 = 13;

/// Last data row Excel can hold, header excluded.
const MAX_DATA_ROWS: usize = 1_048_575;

const MAX_COLUMN_WIDTH: usize = 50;

/// Characters Excel accepts in one cell.
pub const MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("{0} measurements exceed the spreadsheet row limit")]
    TooManyRows(usize),
}

// ---------------------------------------------------------------------------
// Row values
// ---------------------------------------------------------------------------

/// One cell value. Numbers stay numeric in the workbook so consumers can
/// filter and chart them.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    fn display_len(&self) -> usize {
        match self {
            Cell::Text(s) => s.chars().count(),
            Cell::Number(n) => n.to_string().len(),
        }
    }
}

/// Values for one data-sheet row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub water_body: String,
    pub water_body_type: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    pub measured_at: String,
    pub measured_by: String,
    pub readings: WaterQualityReadings,
    pub compliance_status: &'static str,
    /// Alerts joined by `"; "`, or `"None"`.
    pub alerts: String,
    pub notes: String,
}

impl ExportRow {
    pub fn is_compliant(&self) -> bool {
        self.compliance_status == STATUS_COMPLIANT
    }

    /// The row's cells in `HEADERS` order.
    pub fn cells(&self) -> Vec<Cell> {
        let r = &self.readings;
        vec![
            Cell::Text(self.water_body.clone()),
            Cell::Text(self.water_body_type.to_string()),
            Cell::Number(self.latitude),
            Cell::Number(self.longitude),
            Cell::Text(self.measured_at.clone()),
            Cell::Text(self.measured_by.clone()),
            Cell::Number(r.ph),
            Cell::Number(r.dissolved_oxygen),
            Cell::Number(r.temperature),
            Cell::Number(r.turbidity),
            Cell::Number(r.nitrates),
            Cell::Number(r.phosphates),
            Cell::Number(f64::from(r.ecoli_count)),
            Cell::Text(self.compliance_status.to_string()),
            Cell::Text(self.alerts.clone()),
            Cell::Text(self.notes.clone()),
        ]
    }
}

pub fn export_row(measurement: &Measurement, water_body: &WaterBody, standards: &StandardsRegistry) -> ExportRow {
    let evaluation = evaluate(&measurement.readings, standards);
    let position = measurement.location_or(water_body);

    ExportRow {
        water_body: water_body.name.clone(),
        water_body_type: water_body.water_body_type.label(),
        latitude: position.latitude,
        longitude: position.longitude,
        measured_at: measurement.measured_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        measured_by: measurement.measured_by.clone(),
        readings: measurement.readings,
        compliance_status: evaluation.compliance_status(),
        alerts: evaluation.alerts_text(),
        notes: measurement.notes.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub exported_at: DateTime<Utc>,
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
}

pub fn summarize(rows: &[ExportRow], exported_at: DateTime<Utc>) -> ReportSummary {
    let total = rows.len();
    let compliant = rows.iter().filter(|r| r.is_compliant()).count();
    ReportSummary {
        exported_at,
        total,
        compliant,
        non_compliant: total - compliant,
    }
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

/// Builds the workbook stamped with the current time.
pub fn build_report(
    rows: &[(Measurement, WaterBody)],
    standards: &StandardsRegistry,
) -> Result<Vec<u8>, ReportError> {
    build_report_at(rows, standards, Utc::now())
}

/// Builds the workbook with an explicit export time. Use this in tests.
pub fn build_report_at(
    rows: &[(Measurement, WaterBody)],
    standards: &StandardsRegistry,
    exported_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    if rows.len() > MAX_DATA_ROWS {
        return Err(ReportError::TooManyRows(rows.len()));
    }

    let export_rows: Vec<ExportRow> = rows
        .iter()
        .map(|(m, wb)| export_row(m, wb, standards))
        .collect();
    let summary = summarize(&export_rows, exported_at);

    let mut workbook = Workbook::new();
    workbook.push_worksheet(write_data_sheet(&export_rows)?);
    workbook.push_worksheet(write_summary_sheet(&summary)?);
    workbook.push_worksheet(write_standards_sheet(standards)?);
    Ok(workbook.save_to_buffer()?)
}

fn title_format() -> Format {
    Format::new().set_bold().set_font_size(14)
}

fn write_data_sheet(rows: &[ExportRow]) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(DATA_SHEET)?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x0066CC))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let flagged_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xFFD700));

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        let flagged = !row.is_compliant();

        for (col, cell) in row.cells().into_iter().enumerate() {
            widths[col] = widths[col].max(cell.display_len());
            let col = col as u16;
            match cell {
                Cell::Text(text) if flagged && col == STATUS_COLUMN => {
                    sheet.write_string_with_format(row_num, col, text, &flagged_format)?;
                }
                Cell::Text(text) => {
                    sheet.write_string(row_num, col, clip_to_cell(text))?;
                }
                Cell::Number(value) => {
                    sheet.write_number(row_num, col, value)?;
                }
            }
        }
    }

    for (col, width) in widths.into_iter().enumerate() {
        sheet.set_column_width(col as u16, (width + 2).min(MAX_COLUMN_WIDTH) as f64)?;
    }
    Ok(sheet)
}

/// Cuts text to the per-cell limit. Notes are unbounded in storage.
fn clip_to_cell(text: String) -> String {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

fn write_summary_sheet(summary: &ReportSummary) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(SUMMARY_SHEET)?;

    sheet.write_string_with_format(0, 0, "AquaWatch Water Quality Export Summary", &title_format())?;

    sheet.write_string(2, 0, "Export Date:")?;
    sheet.write_string(2, 1, summary.exported_at.format("%Y-%m-%d %H:%M:%S").to_string())?;
    sheet.write_string(3, 0, "Total Measurements:")?;
    sheet.write_number(3, 1, summary.total as f64)?;
    sheet.write_string(4, 0, "Compliant Measurements:")?;
    sheet.write_number(4, 1, summary.compliant as f64)?;
    sheet.write_string(5, 0, "Non-Compliant Measurements:")?;
    sheet.write_number(5, 1, summary.non_compliant as f64)?;

    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(1, 22)?;
    Ok(sheet)
}

fn write_standards_sheet(standards: &StandardsRegistry) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name(STANDARDS_SHEET)?;

    sheet.write_string_with_format(0, 0, "EPA Water Quality Standards Reference", &title_format())?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xCCCCCC));
    for (col, header) in ["Parameter", "Standard", "Unit"].into_iter().enumerate() {
        sheet.write_string_with_format(2, col as u16, header, &header_format)?;
    }

    for (offset, entry) in standards.entries().iter().enumerate() {
        let row = 3 + offset as u32;
        sheet.write_string(row, 0, entry.label)?;
        sheet.write_number(row, 1, entry.value)?;
        sheet.write_string(row, 2, entry.unit)?;
    }

    sheet.set_column_width(0, 30)?;
    sheet.set_column_width(1, 12)?;
    sheet.set_column_width(2, 12)?;
    Ok(sheet)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, WaterBodyType};
    use calamine::{Data, Range, Reader, Xlsx};
    use chrono::TimeZone;
    use std::io::Cursor;

    fn lake() -> WaterBody {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        WaterBody {
            id: 1,
            name: "Test Lake".to_string(),
            water_body_type: WaterBodyType::Lake,
            location: GeoPoint { latitude: 37.0902, longitude: -95.7129 },
            description: String::new(),
            regulatory_body: "EPA Region 7".to_string(),
            monitoring_start_date: t.date_naive(),
            is_active: true,
            created_at: t,
            updated_at: t,
        }
    }

    fn measurement(id: i64, ph: f64) -> Measurement {
        Measurement {
            id,
            water_body_id: 1,
            measured_at: Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 9).unwrap(),
            readings: WaterQualityReadings {
                ph,
                dissolved_oxygen: 8.0,
                temperature: 20.0,
                turbidity: 3.0,
                nitrates: 5.0,
                phosphates: 0.05,
                ecoli_count: 50,
            },
            sample_location: None,
            measured_by: "Test Researcher".to_string(),
            notes: format!("sample {}", id),
            created_at: Utc::now(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
    }

    fn sheet(bytes: Vec<u8>, name: &str) -> Range<Data> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).expect("report should be a readable xlsx");
        workbook.worksheet_range(name).expect("sheet should exist")
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn test_export_row_for_compliant_measurement() {
        let row = export_row(&measurement(1, 7.5), &lake(), &StandardsRegistry::default());
        assert_eq!(row.water_body, "Test Lake");
        assert_eq!(row.water_body_type, "Lake");
        assert_eq!(row.measured_at, "2024-05-01 14:05:09");
        assert_eq!(row.compliance_status, "COMPLIANT");
        assert_eq!(row.alerts, "None");
        assert_eq!((row.latitude, row.longitude), (37.0902, -95.7129));
        assert_eq!(row.cells().len(), HEADERS.len());
    }

    #[test]
    fn test_export_row_uses_sample_location_when_present() {
        let mut m = measurement(1, 7.5);
        m.sample_location = Some(GeoPoint { latitude: 37.5, longitude: -95.5 });
        let row = export_row(&m, &lake(), &StandardsRegistry::default());
        assert_eq!((row.latitude, row.longitude), (37.5, -95.5));
    }

    #[test]
    fn test_export_row_for_non_compliant_measurement() {
        let row = export_row(&measurement(1, 5.0), &lake(), &StandardsRegistry::default());
        assert_eq!(row.compliance_status, "NON-COMPLIANT");
        assert_eq!(row.alerts, "pH out of range: 5.0");
        assert!(!row.is_compliant());
    }

    #[test]
    fn test_summarize_counts() {
        let standards = StandardsRegistry::default();
        let rows: Vec<ExportRow> = [7.5, 5.0, 7.0, 9.5]
            .iter()
            .enumerate()
            .map(|(i, ph)| export_row(&measurement(i as i64, *ph), &lake(), &standards))
            .collect();
        let summary = summarize(&rows, fixed_now());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.compliant, 2);
        assert_eq!(summary.non_compliant, 2);
    }

    #[test]
    fn test_workbook_has_three_named_sheets() {
        let bytes = build_report_at(&[], &StandardsRegistry::default(), fixed_now()).unwrap();
        let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        assert_eq!(workbook.sheet_names(), vec![DATA_SHEET, SUMMARY_SHEET, STANDARDS_SHEET]);
    }

    #[test]
    fn test_empty_report_has_header_only_and_zero_counts() {
        let bytes = build_report_at(&[], &StandardsRegistry::default(), fixed_now()).unwrap();

        let data = sheet(bytes.clone(), DATA_SHEET);
        assert_eq!(data.height(), 1, "empty export should contain only the header row");
        for (col, header) in HEADERS.iter().enumerate() {
            assert_eq!(data.get_value((0, col as u32)), Some(&text(header)));
        }

        let summary = sheet(bytes, SUMMARY_SHEET);
        assert_eq!(summary.get_value((2, 1)), Some(&text("2024-06-01 08:30:00")));
        assert_eq!(summary.get_value((3, 1)), Some(&Data::Float(0.0)));
        assert_eq!(summary.get_value((4, 1)), Some(&Data::Float(0.0)));
        assert_eq!(summary.get_value((5, 1)), Some(&Data::Float(0.0)));
    }

    #[test]
    fn test_rows_follow_input_order() {
        let wb = lake();
        let input: Vec<(Measurement, WaterBody)> = (1..=5)
            .map(|i| (measurement(i, 7.0 + i as f64 * 0.1), wb.clone()))
            .collect();
        let bytes = build_report_at(&input, &StandardsRegistry::default(), fixed_now()).unwrap();
        let data = sheet(bytes, DATA_SHEET);

        assert_eq!(data.height(), input.len() + 1);
        for (i, (m, _)) in input.iter().enumerate() {
            let row = (i + 1) as u32;
            assert_eq!(data.get_value((row, 15)), Some(&text(&m.notes)));
            assert_eq!(data.get_value((row, 6)), Some(&Data::Float(m.readings.ph)));
        }
    }

    #[test]
    fn test_non_compliant_row_is_marked_in_status_column() {
        let wb = lake();
        let input = vec![(measurement(1, 5.0), wb.clone()), (measurement(2, 7.5), wb)];
        let bytes = build_report_at(&input, &StandardsRegistry::default(), fixed_now()).unwrap();

        let data = sheet(bytes.clone(), DATA_SHEET);
        assert_eq!(data.get_value((1, STATUS_COLUMN as u32)), Some(&text("NON-COMPLIANT")));
        assert_eq!(data.get_value((1, 14)), Some(&text("pH out of range: 5.0")));
        assert_eq!(data.get_value((2, STATUS_COLUMN as u32)), Some(&text("COMPLIANT")));
        assert_eq!(data.get_value((2, 14)), Some(&text("None")));
        assert_eq!(data.get_value((1, 0)), Some(&text("Test Lake")));
        assert_eq!(data.get_value((1, 1)), Some(&text("Lake")));
        assert_eq!(data.get_value((1, 12)), Some(&Data::Float(50.0)));

        let summary = sheet(bytes, SUMMARY_SHEET);
        assert_eq!(summary.get_value((3, 1)), Some(&Data::Float(2.0)));
        assert_eq!(summary.get_value((4, 1)), Some(&Data::Float(1.0)));
        assert_eq!(summary.get_value((5, 1)), Some(&Data::Float(1.0)));
    }

    #[test]
    fn test_standards_sheet_lists_configured_values() {
        let standards = StandardsRegistry { ecoli_max: 126.0, ..Default::default() };
        let bytes = build_report_at(&[], &standards, fixed_now()).unwrap();
        let ref_sheet = sheet(bytes, STANDARDS_SHEET);

        assert_eq!(ref_sheet.get_value((0, 0)), Some(&text("EPA Water Quality Standards Reference")));
        assert_eq!(ref_sheet.get_value((2, 0)), Some(&text("Parameter")));
        assert_eq!(ref_sheet.get_value((3, 0)), Some(&text("pH (Minimum)")));
        assert_eq!(ref_sheet.get_value((3, 1)), Some(&Data::Float(6.5)));
        assert_eq!(ref_sheet.get_value((10, 0)), Some(&text("E. coli (Maximum)")));
        assert_eq!(ref_sheet.get_value((10, 1)), Some(&Data::Float(126.0)));
        assert_eq!(ref_sheet.get_value((10, 2)), Some(&text("CFU/100mL")));
    }

    #[test]
    fn test_text_longer_than_cell_limit_is_clipped() {
        let mut long = measurement(1, 7.5);
        long.notes = "n".repeat(40_000);
        long.measured_by = "é".repeat(MAX_CELL_CHARS + 5);
        let rows = vec![(long, lake()), (measurement(2, 7.5), lake())];

        let data = sheet(build_report_at(&rows, &StandardsRegistry::default(), fixed_now()).unwrap(), DATA_SHEET);
        assert_eq!(data.height(), 3);
        assert_eq!(data.get_value((1, 15)), Some(&text(&"n".repeat(MAX_CELL_CHARS))));
        assert_eq!(data.get_value((1, 5)), Some(&text(&"é".repeat(MAX_CELL_CHARS))));
        assert_eq!(data.get_value((2, 15)), Some(&text("sample 2")));
    }

    #[test]
    fn test_clip_to_cell_keeps_short_text() {
        assert_eq!(clip_to_cell("short".to_string()), "short");
        assert_eq!(clip_to_cell("x".repeat(MAX_CELL_CHARS)).len(), MAX_CELL_CHARS);
    }
}
