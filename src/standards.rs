/// Regulatory threshold registry for the AquaWatch service.
///
/// Holds the EPA-style limits every measurement is checked against. The
/// registry is loaded once at startup (see `config`) and then only ever
/// borrowed: the evaluator and report builder take `&StandardsRegistry`
/// so tests can run side by side with different threshold sets.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The eight configured thresholds. Any key missing from the config file
/// falls back to the EPA default for that key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StandardsRegistry {
    pub ph_min: f64,
    pub ph_max: f64,
    /// mg/L
    pub dissolved_oxygen_min: f64,
    /// °C
    pub temperature_max: f64,
    /// NTU
    pub turbidity_max: f64,
    /// mg/L
    pub nitrates_max: f64,
    /// mg/L
    pub phosphates_max: f64,
    /// CFU/100mL
    pub ecoli_max: f64,
}

impl Default for StandardsRegistry {
    fn default() -> Self {
        Self {
            ph_min: 6.5,
            ph_max: 8.5,
            dissolved_oxygen_min: 5.0,
            temperature_max: 30.0,
            turbidity_max: 5.0,
            nitrates_max: 10.0,
            phosphates_max: 0.1,
            ecoli_max: 100.0,
        }
    }
}

/// One row of the standards reference: threshold key, report label, value, unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardEntry {
    pub key: &'static str,
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

impl StandardsRegistry {
    /// Rejects registries no measurement could sensibly be judged against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in self.entries() {
            if !entry.value.is_finite() {
                return Err(ConfigError::InvalidStandard {
                    key: entry.key,
                    reason: format!("must be a finite number, got {}", entry.value),
                });
            }
        }
        if self.ph_min > self.ph_max {
            return Err(ConfigError::InvalidStandard {
                key: "ph_min",
                reason: format!("ph_min ({}) is above ph_max ({})", self.ph_min, self.ph_max),
            });
        }
        Ok(())
    }

    /// All thresholds in reference-sheet order.
    pub fn entries(&self) -> [StandardEntry; 8] {
        [
            StandardEntry { key: "ph_min", label: "pH (Minimum)", value: self.ph_min, unit: "pH units" },
            StandardEntry { key: "ph_max", label: "pH (Maximum)", value: self.ph_max, unit: "pH units" },
            StandardEntry {
                key: "dissolved_oxygen_min",
                label: "Dissolved Oxygen (Minimum)",
                value: self.dissolved_oxygen_min,
                unit: "mg/L",
            },
            StandardEntry {
                key: "temperature_max",
                label: "Temperature (Maximum)",
                value: self.temperature_max,
                unit: "°C",
            },
            StandardEntry { key: "turbidity_max", label: "Turbidity (Maximum)", value: self.turbidity_max, unit: "NTU" },
            StandardEntry { key: "nitrates_max", label: "Nitrates (Maximum)", value: self.nitrates_max, unit: "mg/L" },
            StandardEntry {
                key: "phosphates_max",
                label: "Phosphates (Maximum)",
                value: self.phosphates_max,
                unit: "mg/L",
            },
            StandardEntry { key: "ecoli_max", label: "E. coli (Maximum)", value: self.ecoli_max, unit: "CFU/100mL" },
        ]
    }

    /// Looks up a threshold by its config key. Returns `None` if unknown.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries().into_iter().find(|e| e.key == key).map(|e| e.value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_epa_reference_values() {
        let s = StandardsRegistry::default();
        assert_eq!(s.ph_min, 6.5);
        assert_eq!(s.ph_max, 8.5);
        assert_eq!(s.dissolved_oxygen_min, 5.0);
        assert_eq!(s.temperature_max, 30.0);
        assert_eq!(s.turbidity_max, 5.0);
        assert_eq!(s.nitrates_max, 10.0);
        assert_eq!(s.phosphates_max, 0.1);
        assert_eq!(s.ecoli_max, 100.0);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_entries_cover_every_key_once() {
        let s = StandardsRegistry::default();
        let mut seen = std::collections::HashSet::new();
        for entry in s.entries() {
            assert!(seen.insert(entry.key), "duplicate key '{}'", entry.key);
            assert_eq!(s.get(entry.key), Some(entry.value));
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(s.get("salinity_max"), None);
    }

    #[test]
    fn test_partial_table_falls_back_to_defaults() {
        let s: StandardsRegistry = toml::from_str("ph_min = 6.0\necoli_max = 235").unwrap();
        assert_eq!(s.ph_min, 6.0);
        assert_eq!(s.ecoli_max, 235.0);
        assert_eq!(s.ph_max, 8.5);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let result: Result<StandardsRegistry, _> = toml::from_str("ph_minimum = 6.0");
        assert!(result.is_err(), "typo'd threshold names must not be silently ignored");
    }

    #[test]
    fn test_inverted_ph_range_is_invalid() {
        let s = StandardsRegistry { ph_min: 9.0, ph_max: 8.0, ..Default::default() };
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidStandard { key: "ph_min", .. })
        ));
    }

    #[test]
    fn test_non_finite_threshold_is_invalid() {
        let s = StandardsRegistry { turbidity_max: f64::INFINITY, ..Default::default() };
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidStandard { key: "turbidity_max", .. })
        ));
    }
}
