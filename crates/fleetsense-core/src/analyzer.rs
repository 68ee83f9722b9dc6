//! Per-domain vehicle analysis.
//!
//! Each analyzer classifies its sensor subset and computes derived metrics
//! deterministically, then asks the narrative engine for prose. Engine
//! failures never escape the analyzer: they become a `DomainResult` with
//! error status, so sibling domains and sweeps are unaffected.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::narrative::{NarrativeEngine, NarrativeRequest};
use crate::ranges::{HealthTier, RangeTable};
use crate::snapshot::SensorReading;
use crate::store::VehicleDataStore;

/// Analysis perspective over the same vehicle data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDomain {
    Diagnostic,
    Maintenance,
    Performance,
}

impl AnalysisDomain {
    pub fn all() -> [AnalysisDomain; 3] {
        [
            AnalysisDomain::Diagnostic,
            AnalysisDomain::Maintenance,
            AnalysisDomain::Performance,
        ]
    }
}

impl fmt::Display for AnalysisDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisDomain::Diagnostic => "diagnostic",
            AnalysisDomain::Maintenance => "maintenance",
            AnalysisDomain::Performance => "performance",
        };
        f.write_str(s)
    }
}

/// Outcome status of one domain analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Success,
    Error,
}

/// Result of one domain analysis. Either `output` (success) or `error`
/// (failure message) is populated, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainResult {
    pub domain: AnalysisDomain,
    pub status: DomainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainResult {
    pub fn success(domain: AnalysisDomain, output: String) -> Self {
        Self {
            domain,
            status: DomainStatus::Success,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(domain: AnalysisDomain, message: String) -> Self {
        Self {
            domain,
            status: DomainStatus::Error,
            output: None,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DomainStatus::Success
    }
}

/// Fluid and wear sensors the maintenance analyzer watches.
const MAINTENANCE_SENSORS: &[&str] = &[
    "oil_pressure_kpa",
    "coolant_temp_c",
    "fuel_level_percent",
    "brake_fluid_level_percent",
    "tire_pressure_fl",
    "battery_voltage",
];

/// Motion and thermal sensors the performance analyzer watches.
const PERFORMANCE_SENSORS: &[&str] = &[
    "rpm",
    "speed_kmph",
    "engine_temp_c",
    "motor_temp_c",
    "battery_soc",
];

/// One analysis domain bound to the shared store, range table and engine.
pub struct DomainAnalyzer {
    domain: AnalysisDomain,
    store: Arc<VehicleDataStore>,
    ranges: Arc<RangeTable>,
    engine: Arc<dyn NarrativeEngine>,
    narrative_timeout: Duration,
}

impl DomainAnalyzer {
    pub fn new(
        domain: AnalysisDomain,
        store: Arc<VehicleDataStore>,
        ranges: Arc<RangeTable>,
        engine: Arc<dyn NarrativeEngine>,
        narrative_timeout: Duration,
    ) -> Self {
        Self {
            domain,
            store,
            ranges,
            engine,
            narrative_timeout,
        }
    }

    /// The sensor subset this domain reads. Diagnostic takes the full
    /// snapshot; the others take fixed subsets.
    fn sensor_subset(&self, vehicle_id: &str) -> Result<BTreeMap<String, SensorReading>> {
        match self.domain {
            AnalysisDomain::Diagnostic => Ok(self.store.get(vehicle_id)?.sensors.clone()),
            AnalysisDomain::Maintenance => self.store.get_fields(vehicle_id, MAINTENANCE_SENSORS),
            AnalysisDomain::Performance => self.store.get_fields(vehicle_id, PERFORMANCE_SENSORS),
        }
    }

    fn classify_subset(
        &self,
        sensors: &BTreeMap<String, SensorReading>,
    ) -> BTreeMap<String, HealthTier> {
        sensors
            .iter()
            .map(|(name, reading)| (name.clone(), self.ranges.classify(name, Some(reading))))
            .collect()
    }

    /// Deterministic domain metrics, computed before any narrative call.
    fn derived_metrics(
        &self,
        sensors: &BTreeMap<String, SensorReading>,
        tiers: &BTreeMap<String, HealthTier>,
    ) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        match self.domain {
            AnalysisDomain::Diagnostic => {
                let fault_count = sensors
                    .get("dtc_codes")
                    .and_then(SensorReading::as_fault_codes)
                    .map(|codes| codes.len())
                    .unwrap_or(0);
                metrics.insert("fault_code_active_count".to_string(), fault_count as f64);
            }
            AnalysisDomain::Maintenance => {
                let degraded = tiers
                    .values()
                    .filter(|t| matches!(t, HealthTier::Warning | HealthTier::Critical))
                    .count();
                metrics.insert("sensors_needing_attention".to_string(), degraded as f64);
            }
            AnalysisDomain::Performance => {
                let rpm = sensors.get("rpm").and_then(SensorReading::as_scalar);
                let speed = sensors.get("speed_kmph").and_then(SensorReading::as_scalar);
                if let (Some(rpm), Some(speed)) = (rpm, speed) {
                    if speed > 0.0 {
                        metrics.insert(
                            "rpm_per_kmph".to_string(),
                            (rpm / speed * 100.0).round() / 100.0,
                        );
                    }
                }
                let temp = sensors
                    .get("engine_temp_c")
                    .or_else(|| sensors.get("motor_temp_c"))
                    .and_then(SensorReading::as_scalar);
                if let Some(temp) = temp {
                    metrics.insert("thermal_efficiency".to_string(), thermal_efficiency(temp));
                }
            }
        }
        metrics
    }

    /// Analyze one vehicle. Fails only with `VehicleNotFound`; narrative
    /// failures are captured in the returned `DomainResult`.
    pub async fn analyze(&self, vehicle_id: &str, instruction: &str) -> Result<DomainResult> {
        let sensors = self.sensor_subset(vehicle_id)?;
        let tiers = self.classify_subset(&sensors);
        let metrics = self.derived_metrics(&sensors, &tiers);

        let request = NarrativeRequest {
            vehicle_id: vehicle_id.to_string(),
            domain: self.domain,
            instruction: instruction.to_string(),
            tiers,
            metrics,
        };

        match tokio::time::timeout(self.narrative_timeout, self.engine.generate(&request)).await {
            Ok(Ok(text)) => Ok(DomainResult::success(self.domain, text)),
            Ok(Err(e)) => {
                warn!(
                    event = "analysis.narrative_failed",
                    vehicle_id = %vehicle_id,
                    domain = %self.domain,
                    error = %e,
                );
                Ok(DomainResult::failure(self.domain, e.to_string()))
            }
            Err(_) => {
                let secs = self.narrative_timeout.as_secs();
                warn!(
                    event = "analysis.narrative_timeout",
                    vehicle_id = %vehicle_id,
                    domain = %self.domain,
                    timeout_secs = secs,
                );
                Ok(DomainResult::failure(
                    self.domain,
                    format!("narrative call timed out after {secs}s"),
                ))
            }
        }
    }
}

/// Thermal efficiency figure over the engine/motor temperature: 1.0 inside
/// the 80-95C optimal band, linear falloff with distance outside it.
fn thermal_efficiency(temp_c: f64) -> f64 {
    const BAND: (f64, f64) = (80.0, 95.0);
    let distance = if temp_c < BAND.0 {
        BAND.0 - temp_c
    } else if temp_c > BAND.1 {
        temp_c - BAND.1
    } else {
        0.0
    };
    (1.0 - distance / 100.0).max(0.0)
}
