//! EPA threshold checking.
//!
//! `evaluate` is the single place a measurement is judged against the
//! configured standards. It is pure: the same readings and registry always
//! give the same alerts in the same order, so the submission flow, the
//! dashboard and the spreadsheet export can call it independently and
//! agree.

use serde::Serialize;
use std::fmt;

use crate::model::WaterQualityReadings;
use crate::standards::StandardsRegistry;

pub const STATUS_COMPLIANT: &str = "COMPLIANT";
pub const STATUS_NON_COMPLIANT: &str = "NON-COMPLIANT";

/// Coarse water-quality rating derived from the number of alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    /// 0 alerts → excellent, 1–2 → good, 3–4 → fair, 5 or more → poor.
    pub fn from_alert_count(count: usize) -> Self {
        match count {
            0 => QualityTier::Excellent,
            1..=2 => QualityTier::Good,
            3..=4 => QualityTier::Fair,
            _ => QualityTier::Poor,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Excellent => "excellent",
            QualityTier::Good => "good",
            QualityTier::Fair => "fair",
            QualityTier::Poor => "poor",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of checking one measurement against the standards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Human-readable alert messages, in parameter order.
    pub alerts: Vec<String>,
    pub tier: QualityTier,
}

impl Evaluation {
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    pub fn is_compliant(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn compliance_status(&self) -> &'static str {
        if self.is_compliant() {
            STATUS_COMPLIANT
        } else {
            STATUS_NON_COMPLIANT
        }
    }

    /// Alerts joined with `"; "`, or `"None"`.
    pub fn alerts_text(&self) -> String {
        if self.alerts.is_empty() {
            "None".to_string()
        } else {
            self.alerts.join("; ")
        }
    }
}

/// Checks readings against the standards.
///
/// Order is fixed: pH, dissolved oxygen, temperature, turbidity, nitrates,
/// phosphates, E. coli. Each parameter yields at most one alert. Bounds are
/// exclusive: a value exactly at a threshold complies.
pub fn evaluate(readings: &WaterQualityReadings, standards: &StandardsRegistry) -> Evaluation {
    let mut alerts = Vec::new();

    if readings.ph < standards.ph_min || readings.ph > standards.ph_max {
        alerts.push(format!("pH out of range: {}", decimal(readings.ph)));
    }
    if readings.dissolved_oxygen < standards.dissolved_oxygen_min {
        alerts.push(format!("Low dissolved oxygen: {} mg/L", decimal(readings.dissolved_oxygen)));
    }
    if readings.temperature > standards.temperature_max {
        alerts.push(format!("High temperature: {}°C", decimal(readings.temperature)));
    }
    if readings.turbidity > standards.turbidity_max {
        alerts.push(format!("High turbidity: {} NTU", decimal(readings.turbidity)));
    }
    if readings.nitrates > standards.nitrates_max {
        alerts.push(format!("High nitrates: {} mg/L", decimal(readings.nitrates)));
    }
    if readings.phosphates > standards.phosphates_max {
        alerts.push(format!("High phosphates: {} mg/L", decimal(readings.phosphates)));
    }
    if f64::from(readings.ecoli_count) > standards.ecoli_max {
        alerts.push(format!("High E. coli count: {} CFU/100mL", readings.ecoli_count));
    }

    let tier = QualityTier::from_alert_count(alerts.len());
    Evaluation { alerts, tier }
}

/// Prints a reading the way it was written down: `5.0`, not `5`.
///
/// Shortest round-trip digits. Magnitudes below 1e-4 or from 1e16 up switch
/// to scientific notation with a signed, at least two-digit exponent
/// (`1e-05`, `2.5e+16`).
fn decimal(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value).to_lowercase();
    }

    // `{:e}` gives the shortest digits, e.g. "-1.25e-5"
    let sci = format!("{:e}", value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{:?}", value);
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return format!("{:?}", value);
    };

    if !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let point = (exp + 1) as usize;

    let body = if exp < 0 {
        format!("0.{}{}", "0".repeat((-exp - 1) as usize), digits)
    } else if digits.len() <= point {
        format!("{}{}.0", digits, "0".repeat(point - digits.len()))
    } else {
        format!("{}.{}", &digits[..point], &digits[point..])
    };
    format!("{}{}", sign, body)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> WaterQualityReadings {
        WaterQualityReadings {
            ph: 7.5,
            dissolved_oxygen: 8.0,
            temperature: 20.0,
            turbidity: 3.0,
            nitrates: 5.0,
            phosphates: 0.05,
            ecoli_count: 50,
        }
    }

    /// Readings with every parameter violated.
    fn all_bad() -> WaterQualityReadings {
        WaterQualityReadings {
            ph: 9.2,
            dissolved_oxygen: 2.5,
            temperature: 31.0,
            turbidity: 12.0,
            nitrates: 11.0,
            phosphates: 0.4,
            ecoli_count: 500,
        }
    }

    #[test]
    fn test_compliant_sample_is_excellent() {
        let eval = evaluate(&baseline(), &StandardsRegistry::default());
        assert!(eval.alerts.is_empty());
        assert_eq!(eval.tier, QualityTier::Excellent);
        assert_eq!(eval.compliance_status(), "COMPLIANT");
        assert_eq!(eval.alerts_text(), "None");
    }

    #[test]
    fn test_low_ph_single_alert() {
        let readings = WaterQualityReadings { ph: 5.0, ..baseline() };
        let eval = evaluate(&readings, &StandardsRegistry::default());
        assert_eq!(eval.alerts, vec!["pH out of range: 5.0".to_string()]);
        assert_eq!(eval.tier, QualityTier::Good);
        assert_eq!(eval.compliance_status(), "NON-COMPLIANT");
    }

    #[test]
    fn test_five_violations_is_poor() {
        let readings = WaterQualityReadings {
            ph: 5.0,
            dissolved_oxygen: 3.0,
            temperature: 35.0,
            turbidity: 10.0,
            nitrates: 15.0,
            ..baseline()
        };
        let eval = evaluate(&readings, &StandardsRegistry::default());
        assert_eq!(eval.alerts.len(), 5);
        assert_eq!(eval.tier, QualityTier::Poor);
        assert_eq!(
            eval.alerts,
            vec![
                "pH out of range: 5.0",
                "Low dissolved oxygen: 3.0 mg/L",
                "High temperature: 35.0°C",
                "High turbidity: 10.0 NTU",
                "High nitrates: 15.0 mg/L",
            ]
        );
    }

    #[test]
    fn test_each_single_violation_gives_one_alert_and_good() {
        let bad = all_bad();
        let variants = [
            WaterQualityReadings { ph: bad.ph, ..baseline() },
            WaterQualityReadings { dissolved_oxygen: bad.dissolved_oxygen, ..baseline() },
            WaterQualityReadings { temperature: bad.temperature, ..baseline() },
            WaterQualityReadings { turbidity: bad.turbidity, ..baseline() },
            WaterQualityReadings { nitrates: bad.nitrates, ..baseline() },
            WaterQualityReadings { phosphates: bad.phosphates, ..baseline() },
            WaterQualityReadings { ecoli_count: bad.ecoli_count, ..baseline() },
        ];
        for readings in variants {
            let eval = evaluate(&readings, &StandardsRegistry::default());
            assert_eq!(eval.alerts.len(), 1, "expected one alert for {:?}", readings);
            assert_eq!(eval.tier, QualityTier::Good);
        }
    }

    #[test]
    fn test_all_seven_alert_messages_in_order() {
        let eval = evaluate(&all_bad(), &StandardsRegistry::default());
        assert_eq!(
            eval.alerts,
            vec![
                "pH out of range: 9.2",
                "Low dissolved oxygen: 2.5 mg/L",
                "High temperature: 31.0°C",
                "High turbidity: 12.0 NTU",
                "High nitrates: 11.0 mg/L",
                "High phosphates: 0.4 mg/L",
                "High E. coli count: 500 CFU/100mL",
            ]
        );
        assert_eq!(eval.tier, QualityTier::Poor);
    }

    #[test]
    fn test_order_holds_for_non_adjacent_subset() {
        // E. coli and pH only: pH must still come first.
        let readings = WaterQualityReadings { ph: 9.0, ecoli_count: 101, ..baseline() };
        let eval = evaluate(&readings, &StandardsRegistry::default());
        assert_eq!(eval.alerts.len(), 2);
        assert!(eval.alerts[0].starts_with("pH"));
        assert!(eval.alerts[1].starts_with("High E. coli"));
        assert_eq!(eval.alerts_text(), "pH out of range: 9.0; High E. coli count: 101 CFU/100mL");
    }

    #[test]
    fn test_tier_boundaries_are_exact() {
        assert_eq!(QualityTier::from_alert_count(0), QualityTier::Excellent);
        assert_eq!(QualityTier::from_alert_count(1), QualityTier::Good);
        assert_eq!(QualityTier::from_alert_count(2), QualityTier::Good);
        assert_eq!(QualityTier::from_alert_count(3), QualityTier::Fair);
        assert_eq!(QualityTier::from_alert_count(4), QualityTier::Fair);
        assert_eq!(QualityTier::from_alert_count(5), QualityTier::Poor);
        assert_eq!(QualityTier::from_alert_count(7), QualityTier::Poor);
    }

    #[test]
    fn test_tier_boundaries_through_evaluate() {
        let two = WaterQualityReadings { ph: 5.0, dissolved_oxygen: 3.0, ..baseline() };
        let three = WaterQualityReadings { temperature: 35.0, ..two };
        assert_eq!(evaluate(&two, &StandardsRegistry::default()).tier, QualityTier::Good);
        assert_eq!(evaluate(&three, &StandardsRegistry::default()).tier, QualityTier::Fair);
    }

    #[test]
    fn test_values_exactly_at_threshold_comply() {
        let s = StandardsRegistry::default();
        let readings = WaterQualityReadings {
            ph: s.ph_min,
            dissolved_oxygen: s.dissolved_oxygen_min,
            temperature: s.temperature_max,
            turbidity: s.turbidity_max,
            nitrates: s.nitrates_max,
            phosphates: s.phosphates_max,
            ecoli_count: 100,
        };
        assert!(evaluate(&readings, &s).is_compliant());
        let upper_ph = WaterQualityReadings { ph: s.ph_max, ..readings };
        assert!(evaluate(&upper_ph, &s).is_compliant());
    }

    #[test]
    fn test_thresholds_come_from_the_registry_passed_in() {
        let strict = StandardsRegistry { nitrates_max: 4.0, ..Default::default() };
        let readings = baseline(); // nitrates 5.0
        assert!(evaluate(&readings, &StandardsRegistry::default()).is_compliant());
        let eval = evaluate(&readings, &strict);
        assert_eq!(eval.alerts, vec!["High nitrates: 5.0 mg/L".to_string()]);
    }

    #[test]
    fn test_tier_strings() {
        assert_eq!(QualityTier::Excellent.to_string(), "excellent");
        assert_eq!(QualityTier::Poor.as_str(), "poor");
    }

    #[test]
    fn test_decimal_positional_range() {
        assert_eq!(decimal(5.0), "5.0");
        assert_eq!(decimal(9.2), "9.2");
        assert_eq!(decimal(0.05), "0.05");
        assert_eq!(decimal(0.0001), "0.0001");
        assert_eq!(decimal(-0.5), "-0.5");
        assert_eq!(decimal(0.0), "0.0");
        assert_eq!(decimal(123456.5), "123456.5");
        assert_eq!(decimal(1e15), "1000000000000000.0");
    }

    #[test]
    fn test_decimal_scientific_range_has_two_digit_signed_exponent() {
        assert_eq!(decimal(0.00001), "1e-05");
        assert_eq!(decimal(1.5e-7), "1.5e-07");
        assert_eq!(decimal(1e16), "1e+16");
        assert_eq!(decimal(2.5e100), "2.5e+100");
        assert_eq!(decimal(-3e-9), "-3e-09");
    }

    #[test]
    fn test_tiny_reading_in_alert_message() {
        let readings = WaterQualityReadings { dissolved_oxygen: 0.00001, ..baseline() };
        let eval = evaluate(&readings, &StandardsRegistry::default());
        assert_eq!(eval.alerts, vec!["Low dissolved oxygen: 1e-05 mg/L"]);
    }
}
