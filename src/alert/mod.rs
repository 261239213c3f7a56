//! Compliance alerting: measurement checks against the regulatory standards.

pub mod thresholds;

pub use thresholds::{evaluate, Evaluation, QualityTier};
