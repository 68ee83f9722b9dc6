//! Sensor range classification.
//!
//! Maps a sensor reading to a [`HealthTier`] using a static, process-wide
//! table of per-sensor reference ranges. Classification is pure and holds no
//! mutable state, so it is safe to call from concurrent analyses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::SensorReading;

/// Health tier of a single sensor reading.
///
/// `Unknown` covers sensors without a reference range, absent readings, and
/// values outside every known band. It is a distinct reportable condition
/// and must never be folded into `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Normal,
    Warning,
    Critical,
    Unknown,
}

impl HealthTier {
    /// Severity rank for verdict folding: critical > warning > unknown > normal.
    pub fn severity(self) -> u8 {
        match self {
            HealthTier::Critical => 3,
            HealthTier::Warning => 2,
            HealthTier::Unknown => 1,
            HealthTier::Normal => 0,
        }
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthTier::Normal => "normal",
            HealthTier::Warning => "warning",
            HealthTier::Critical => "critical",
            HealthTier::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Inclusive reference bands for one sensor. Bands are evaluated in priority
/// order (critical, then warning, then normal), so overlap is tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSpec {
    pub normal: (f64, f64),
    pub warning: (f64, f64),
    pub critical: (f64, f64),
    pub description: String,
}

impl RangeSpec {
    pub fn new(
        normal: (f64, f64),
        warning: (f64, f64),
        critical: (f64, f64),
        description: &str,
    ) -> Self {
        Self {
            normal,
            warning,
            critical,
            description: description.to_string(),
        }
    }
}

/// Fault codes classified as critical: the misfire family.
pub const CRITICAL_FAULT_CODES: &[&str] = &["P0300", "P0301", "P0302", "P0303", "P0304"];

fn in_band(band: (f64, f64), value: f64) -> bool {
    band.0 <= value && value <= band.1
}

/// Read-only table of per-sensor reference ranges.
#[derive(Debug, Clone)]
pub struct RangeTable {
    specs: BTreeMap<String, RangeSpec>,
}

impl RangeTable {
    /// Build a table from explicit specs.
    pub fn from_specs(specs: BTreeMap<String, RangeSpec>) -> Self {
        Self { specs }
    }

    /// The built-in reference ranges for the supported sensor set.
    pub fn builtin() -> Self {
        let mut specs = BTreeMap::new();
        specs.insert(
            "engine_temp_c".to_string(),
            RangeSpec::new(
                (85.0, 105.0),
                (105.0, 110.0),
                (110.0, f64::INFINITY),
                "Engine temperature in Celsius. Normal operating range is 85-105C.",
            ),
        );
        specs.insert(
            "battery_voltage".to_string(),
            RangeSpec::new(
                (12.4, 14.8),
                (12.0, 12.4),
                (0.0, 12.0),
                "12V system battery voltage. 12.4-14.8V normal.",
            ),
        );
        specs.insert(
            "battery_soc".to_string(),
            RangeSpec::new(
                (20.0, 100.0),
                (10.0, 20.0),
                (0.0, 10.0),
                "Battery state of charge percentage. Below 20% needs charging.",
            ),
        );
        specs.insert(
            "oil_pressure_kpa".to_string(),
            RangeSpec::new(
                (200.0, 350.0),
                (150.0, 200.0),
                (0.0, 150.0),
                "Engine oil pressure in kPa. Critical below 150 kPa during operation.",
            ),
        );
        specs.insert(
            "coolant_temp_c".to_string(),
            RangeSpec::new(
                (80.0, 95.0),
                (95.0, 105.0),
                (105.0, f64::INFINITY),
                "Coolant temperature. Should stay between 80-95C.",
            ),
        );
        specs.insert(
            "rpm".to_string(),
            RangeSpec::new(
                (0.0, 3000.0),
                (3000.0, 5000.0),
                (5000.0, f64::INFINITY),
                "Engine RPM. Idle: 600-1000, normal driving: 1500-3000.",
            ),
        );
        specs.insert(
            "fuel_level_percent".to_string(),
            RangeSpec::new(
                (25.0, 100.0),
                (10.0, 25.0),
                (0.0, 10.0),
                "Fuel level percentage. Refuel below 25%.",
            ),
        );
        specs.insert(
            "tire_pressure_fl".to_string(),
            RangeSpec::new(
                (30.0, 35.0),
                (25.0, 30.0),
                (0.0, 25.0),
                "Front left tire pressure in PSI. Normal: 30-35 PSI.",
            ),
        );
        specs.insert(
            "motor_temp_c".to_string(),
            RangeSpec::new(
                (40.0, 80.0),
                (80.0, 90.0),
                (90.0, f64::INFINITY),
                "Electric motor temperature. Should stay under 80C.",
            ),
        );
        specs.insert(
            "brake_fluid_level_percent".to_string(),
            RangeSpec::new(
                (70.0, 100.0),
                (50.0, 70.0),
                (0.0, 50.0),
                "Brake fluid level. Critical safety issue below 50%.",
            ),
        );
        Self { specs }
    }

    pub fn spec(&self, sensor: &str) -> Option<&RangeSpec> {
        self.specs.get(sensor)
    }

    /// Classify a scalar value against this table.
    ///
    /// Bands are checked critical first, then warning, then normal. A value
    /// outside every band classifies as `Unknown`, not `Normal`.
    pub fn classify_scalar(&self, sensor: &str, value: f64) -> HealthTier {
        let Some(spec) = self.specs.get(sensor) else {
            return HealthTier::Unknown;
        };
        if !value.is_finite() {
            return HealthTier::Unknown;
        }
        if in_band(spec.critical, value) {
            HealthTier::Critical
        } else if in_band(spec.warning, value) {
            HealthTier::Warning
        } else if in_band(spec.normal, value) {
            HealthTier::Normal
        } else {
            HealthTier::Unknown
        }
    }

    /// Classify any reading, scalar or fault-code list. `None` (the sensor
    /// is absent from the snapshot) classifies as `Unknown`.
    pub fn classify(&self, sensor: &str, reading: Option<&SensorReading>) -> HealthTier {
        match reading {
            None => HealthTier::Unknown,
            Some(SensorReading::Scalar(v)) => self.classify_scalar(sensor, *v),
            Some(SensorReading::FaultCodes(codes)) => classify_fault_codes(codes),
        }
    }
}

/// Fault-code rule: empty is normal; any known critical code is critical;
/// otherwise the presence of codes is a warning.
pub fn classify_fault_codes(codes: &[String]) -> HealthTier {
    if codes.is_empty() {
        return HealthTier::Normal;
    }
    if codes
        .iter()
        .any(|c| CRITICAL_FAULT_CODES.contains(&c.as_str()))
    {
        HealthTier::Critical
    } else {
        HealthTier::Warning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_band() {
        let table = RangeTable::builtin();
        assert_eq!(table.classify_scalar("engine_temp_c", 92.5), HealthTier::Normal);
        assert_eq!(table.classify_scalar("coolant_temp_c", 85.0), HealthTier::Normal);
    }

    #[test]
    fn test_critical_takes_precedence_over_overlapping_bands() {
        // Bands deliberately overlap: normal, warning and critical all
        // contain 50.0. Priority order must pick critical.
        let mut specs = BTreeMap::new();
        specs.insert(
            "overlap".to_string(),
            RangeSpec::new((0.0, 100.0), (40.0, 60.0), (45.0, 55.0), "overlap fixture"),
        );
        let table = RangeTable::from_specs(specs);
        assert_eq!(table.classify_scalar("overlap", 50.0), HealthTier::Critical);
        assert_eq!(table.classify_scalar("overlap", 42.0), HealthTier::Warning);
        assert_eq!(table.classify_scalar("overlap", 10.0), HealthTier::Normal);
    }

    #[test]
    fn test_unknown_sensor_is_unknown_not_normal() {
        let table = RangeTable::builtin();
        assert_eq!(
            table.classify_scalar("mystery_sensor", 1.0),
            HealthTier::Unknown
        );
        assert_eq!(table.classify("mystery_sensor", None), HealthTier::Unknown);
    }

    #[test]
    fn test_out_of_band_value_is_unknown() {
        // battery_voltage bands cover 0..=14.8; a 400V pack reading falls
        // outside every band and must surface as unknown.
        let table = RangeTable::builtin();
        assert_eq!(
            table.classify_scalar("battery_voltage", 400.0),
            HealthTier::Unknown
        );
    }

    #[test]
    fn test_absent_reading_is_unknown() {
        let table = RangeTable::builtin();
        assert_eq!(table.classify("engine_temp_c", None), HealthTier::Unknown);
    }

    #[test]
    fn test_open_ended_critical_band() {
        let table = RangeTable::builtin();
        assert_eq!(table.classify_scalar("engine_temp_c", 130.0), HealthTier::Critical);
        assert_eq!(table.classify_scalar("rpm", 9000.0), HealthTier::Critical);
    }

    #[test]
    fn test_nan_is_unknown() {
        let table = RangeTable::builtin();
        assert_eq!(
            table.classify_scalar("engine_temp_c", f64::NAN),
            HealthTier::Unknown
        );
    }

    #[test]
    fn test_fault_codes_rule() {
        assert_eq!(classify_fault_codes(&[]), HealthTier::Normal);
        assert_eq!(
            classify_fault_codes(&["P0420".to_string()]),
            HealthTier::Warning
        );
        assert_eq!(
            classify_fault_codes(&["P0420".to_string(), "P0301".to_string()]),
            HealthTier::Critical
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(HealthTier::Critical.severity() > HealthTier::Warning.severity());
        assert!(HealthTier::Warning.severity() > HealthTier::Unknown.severity());
        assert!(HealthTier::Unknown.severity() > HealthTier::Normal.severity());
    }

    #[test]
    fn test_tier_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthTier::Critical).unwrap(),
            "\"critical\""
        );
        let t: HealthTier = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(t, HealthTier::Unknown);
    }
}
