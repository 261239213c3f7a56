//! Export delivery: the file name and content-type contract, and the
//! query → evaluate → build pipeline behind the `export` command.
//!
//! When served over HTTP the workbook goes out with
//! `Content-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet`
//! and `Content-Disposition: attachment; filename=aquawatch_export_<YYYYMMDD_HHMMSS>.xlsx`.
//! Other tooling matches on both, so they are fixed here rather than at
//! each call site.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::{self, Component};
use crate::report::{build_report_at, ReportError};
use crate::standards::StandardsRegistry;
use crate::store::{MeasurementFilter, StoreError, WaterQualityStore};

pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const FILE_PREFIX: &str = "aquawatch_export";
const FILE_EXTENSION: &str = "xlsx";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `aquawatch_export_YYYYMMDD_HHMMSS.xlsx`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("{}_{}.{}", FILE_PREFIX, now.format("%Y%m%d_%H%M%S"), FILE_EXTENSION)
}

pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename={}", filename)
}

/// A finished export, ready to be written to disk or sent as a response body.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn content_disposition(&self) -> String {
        content_disposition(&self.filename)
    }

    /// Writes the workbook into `dir` under its export file name.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Fetches the measurements matching `filter` and builds the compliance
/// workbook, stamped with `now`.
pub fn export_measurements<S: WaterQualityStore + ?Sized>(
    store: &mut S,
    filter: &MeasurementFilter,
    standards: &StandardsRegistry,
    now: DateTime<Utc>,
) -> Result<ExportFile, ExportError> {
    let rows = store.list_measurements_with_water_bodies(filter)?;
    let bytes = build_report_at(&rows, standards, now)?;
    let filename = export_filename(now);

    logging::info(
        Component::Export,
        Some(&filename),
        &format!("exported {} measurements ({} bytes)", rows.len(), bytes.len()),
    );

    Ok(ExportFile {
        filename,
        content_type: CONTENT_TYPE,
        bytes,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
