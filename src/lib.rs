//! AquaWatch water-quality compliance service.
//!
//! Stores water bodies and field measurements, checks each measurement
//! against configurable EPA-style standards, and exports filtered data as a
//! compliance spreadsheet.
//!
//! Data flow for an export:
//! `store` (query) → `alert::thresholds::evaluate` (per measurement) →
//! `report::build_report` (workbook bytes) → `export` (file name, content type).

pub mod alert;
pub mod analysis;
pub mod config;
pub mod db;
pub mod dev_mode;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod report;
pub mod standards;
pub mod store;
pub mod submission;
