//! Bulk data loading.
//!
//! Submodules:
//! - `workbook`: loads water bodies and measurements from field-data XLSX files.

pub mod workbook;
