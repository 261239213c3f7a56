//! Recording a field measurement.
//!
//! A measurement that breaches the standards is still stored; the alerts
//! come back alongside it so the caller can show them as warnings.

use serde::Serialize;

use crate::alert::thresholds::{evaluate, Evaluation};
use crate::logging::{self, Component};
use crate::model::{Measurement, NewMeasurement};
use crate::standards::StandardsRegistry;
use crate::store::{StoreError, WaterQualityStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub measurement: Measurement,
    pub evaluation: Evaluation,
}

impl Submission {
    /// One `"Alert: <message>"` line per breached standard.
    pub fn warnings(&self) -> Vec<String> {
        self.evaluation
            .alerts
            .iter()
            .map(|alert| format!("Alert: {}", alert))
            .collect()
    }
}

pub fn submit_measurement<S: WaterQualityStore + ?Sized>(
    store: &mut S,
    attrs: NewMeasurement,
    standards: &StandardsRegistry,
) -> Result<Submission, StoreError> {
    let water_body_id = attrs.water_body_id.to_string();
    let measurement = store.create_measurement(attrs).inspect_err(|e| {
        logging::log_store_failure(&water_body_id, "submit measurement", e);
    })?;
    let evaluation = evaluate(&measurement.readings, standards);

    logging::info(
        Component::Store,
        Some(&water_body_id),
        &format!("measurement {} recorded ({})", measurement.id, evaluation.tier),
    );
    for alert in &evaluation.alerts {
        logging::warn(Component::Store, Some(&water_body_id), alert);
    }

    Ok(Submission { measurement, evaluation })
}
