//! Periodic fleet-wide monitoring sweeps.
//!
//! A sweep walks every known vehicle with bounded concurrency, classifies
//! the watch subset, runs a comprehensive analysis, and appends one report
//! per vehicle plus an alert for each vehicle with a critical reading.
//! Per-vehicle failures are recorded as failure markers and never abort the
//! sweep over the remaining fleet.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::{AnalysisOrchestrator, ComprehensiveReport};
use crate::ranges::{HealthTier, RangeTable};
use crate::store::VehicleDataStore;

/// Sweep cycle state: Idle -> Running -> Completed | PartiallyFailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Idle,
    Running,
    Completed,
    PartiallyFailed,
}

/// One classified reading inside a monitoring report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorObservation {
    pub sensor: String,
    /// Scalar value, when the reading is numeric.
    pub value: Option<f64>,
    pub tier: HealthTier,
}

/// Per-vehicle outcome of one sweep cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub sweep_id: Uuid,
    pub vehicle_id: String,
    pub observed_at: DateTime<Utc>,
    pub readings: Vec<SensorObservation>,
    /// Worst tier across the readings.
    pub verdict: HealthTier,
    /// Failure marker: set when this vehicle could not be fully evaluated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ComprehensiveReport>,
}

impl MonitoringReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Critical-only alert. Every alert has a matching report; the reverse does
/// not hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub sweep_id: Uuid,
    pub vehicle_id: String,
    pub raised_at: DateTime<Utc>,
    /// Sensors that classified critical.
    pub critical_sensors: Vec<String>,
}

/// Summary of one finished sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: SweepStatus,
    pub reports: Vec<MonitoringReport>,
    pub alerts: Vec<Alert>,
    pub failed_vehicles: Vec<String>,
}

/// Drives periodic sweeps over the fleet and owns the two append-only
/// sinks: the all-reports log and the critical-only alert log.
pub struct MonitoringScheduler {
    store: Arc<VehicleDataStore>,
    ranges: Arc<RangeTable>,
    orchestrator: Arc<AnalysisOrchestrator>,
    max_concurrency: usize,
    status: std::sync::Mutex<SweepStatus>,
    reports: Mutex<Vec<MonitoringReport>>,
    alerts: Mutex<Vec<Alert>>,
}

impl MonitoringScheduler {
    pub fn new(
        store: Arc<VehicleDataStore>,
        ranges: Arc<RangeTable>,
        orchestrator: Arc<AnalysisOrchestrator>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            ranges,
            orchestrator,
            max_concurrency: max_concurrency.max(1),
            status: std::sync::Mutex::new(SweepStatus::Idle),
            reports: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Current sweep state.
    pub fn status(&self) -> SweepStatus {
        *self.status.lock().unwrap()
    }

    fn set_status(&self, status: SweepStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Run one full sweep over every vehicle in the store.
    pub async fn sweep(&self) -> SweepOutcome {
        let ids = self.store.vehicle_ids();
        self.sweep_ids(&ids).await
    }

    /// Run one sweep over an explicit id list. Ids missing from the store
    /// produce failure-marked reports, not an aborted sweep.
    pub async fn sweep_ids(&self, vehicle_ids: &[String]) -> SweepOutcome {
        let sweep_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_status(SweepStatus::Running);
        info!(
            event = "sweep.started",
            sweep_id = %sweep_id,
            vehicles = vehicle_ids.len(),
        );

        let sem = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::with_capacity(vehicle_ids.len());

        for vehicle_id in vehicle_ids {
            let store = Arc::clone(&self.store);
            let ranges = Arc::clone(&self.ranges);
            let orchestrator = Arc::clone(&self.orchestrator);
            let sem = Arc::clone(&sem);
            let vehicle_id = vehicle_id.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok();
                evaluate_vehicle(store, ranges, orchestrator, sweep_id, vehicle_id).await
            }));
        }

        // Join in spawn order so reports follow the fleet's stable order.
        let mut reports = Vec::with_capacity(vehicle_ids.len());
        let mut alerts = Vec::new();
        for (result, vehicle_id) in join_all(tasks).await.into_iter().zip(vehicle_ids) {
            match result {
                Ok((report, alert)) => {
                    if let Some(alert) = alert {
                        alerts.push(alert);
                    }
                    reports.push(report);
                }
                Err(e) => {
                    // Task panicked; the vehicle still gets a failure marker.
                    warn!(event = "sweep.task_panicked", vehicle_id = %vehicle_id, error = %e);
                    reports.push(failure_report(
                        sweep_id,
                        vehicle_id,
                        format!("sweep task failed: {e}"),
                    ));
                }
            }
        }

        let failed_vehicles: Vec<String> = reports
            .iter()
            .filter(|r| !r.is_complete())
            .map(|r| r.vehicle_id.clone())
            .collect();
        for vehicle_id in &failed_vehicles {
            warn!(event = "sweep.vehicle_failed", sweep_id = %sweep_id, vehicle_id = %vehicle_id);
        }

        self.reports.lock().await.extend(reports.iter().cloned());
        self.alerts.lock().await.extend(alerts.iter().cloned());

        let status = if failed_vehicles.is_empty() {
            SweepStatus::Completed
        } else {
            SweepStatus::PartiallyFailed
        };
        self.set_status(status);

        let finished_at = Utc::now();
        info!(
            event = "sweep.finished",
            sweep_id = %sweep_id,
            status = ?status,
            reports = reports.len(),
            alerts = alerts.len(),
            failed = failed_vehicles.len(),
        );

        SweepOutcome {
            sweep_id,
            started_at,
            finished_at,
            status,
            reports,
            alerts,
            failed_vehicles,
        }
    }

    /// Every report ever appended, across sweeps.
    pub async fn reports(&self) -> Vec<MonitoringReport> {
        self.reports.lock().await.clone()
    }

    /// Every alert ever appended, across sweeps.
    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }
}

fn failure_report(sweep_id: Uuid, vehicle_id: &str, message: String) -> MonitoringReport {
    MonitoringReport {
        sweep_id,
        vehicle_id: vehicle_id.to_string(),
        observed_at: Utc::now(),
        readings: Vec::new(),
        verdict: HealthTier::Unknown,
        failure: Some(message),
        analysis: None,
    }
}

fn fold_verdict(readings: &[SensorObservation]) -> HealthTier {
    readings
        .iter()
        .map(|o| o.tier)
        .max_by_key(|t| t.severity())
        .unwrap_or(HealthTier::Unknown)
}

/// Evaluate one vehicle in isolation: classify the watch subset, run the
/// comprehensive analysis, and decide whether to raise an alert.
async fn evaluate_vehicle(
    store: Arc<VehicleDataStore>,
    ranges: Arc<RangeTable>,
    orchestrator: Arc<AnalysisOrchestrator>,
    sweep_id: Uuid,
    vehicle_id: String,
) -> (MonitoringReport, Option<Alert>) {
    let snapshot = match store.get(&vehicle_id) {
        Ok(s) => s,
        Err(e) => return (failure_report(sweep_id, &vehicle_id, e.to_string()), None),
    };

    // The watch subset: every reported sensor with a reference range, plus
    // fault-code readings, which classify without one.
    let readings: Vec<SensorObservation> = snapshot
        .sensors
        .iter()
        .filter(|(sensor, reading)| {
            ranges.spec(sensor).is_some() || reading.as_fault_codes().is_some()
        })
        .map(|(sensor, reading)| SensorObservation {
            sensor: sensor.clone(),
            value: reading.as_scalar(),
            tier: ranges.classify(sensor, Some(reading)),
        })
        .collect();
    let verdict = fold_verdict(&readings);

    let (analysis, failure) = match orchestrator.run_comprehensive(&vehicle_id).await {
        Ok(report) => (Some(report), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let critical_sensors: Vec<String> = readings
        .iter()
        .filter(|o| o.tier == HealthTier::Critical)
        .map(|o| o.sensor.clone())
        .collect();

    let observed_at = Utc::now();
    let alert = if critical_sensors.is_empty() {
        None
    } else {
        Some(Alert {
            sweep_id,
            vehicle_id: vehicle_id.clone(),
            raised_at: observed_at,
            critical_sensors,
        })
    };

    let report = MonitoringReport {
        sweep_id,
        vehicle_id,
        observed_at,
        readings,
        verdict,
        failure,
        analysis,
    };
    (report, alert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedNarrativeEngine;
    use crate::history::HistoryLog;
    use crate::ranges::RangeSpec;
    use crate::snapshot::{SensorReading, VehicleSnapshot};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn snapshot(id: &str, engine_temp: f64) -> VehicleSnapshot {
        VehicleSnapshot {
            vehicle_id: id.into(),
            car_type: "EV".into(),
            sensors: BTreeMap::from([(
                "engine_temp_c".to_string(),
                SensorReading::Scalar(engine_temp),
            )]),
        }
    }

    /// Reference ranges matching the documented example: normal (70,100),
    /// critical (120,999).
    fn example_ranges() -> RangeTable {
        let mut specs = BTreeMap::new();
        specs.insert(
            "engine_temp_c".to_string(),
            RangeSpec::new(
                (70.0, 100.0),
                (100.0, 120.0),
                (120.0, 999.0),
                "engine temperature fixture",
            ),
        );
        RangeTable::from_specs(specs)
    }

    fn scheduler_over(vehicles: Vec<VehicleSnapshot>, ranges: RangeTable) -> MonitoringScheduler {
        let store = Arc::new(VehicleDataStore::from_snapshots(vehicles));
        let ranges = Arc::new(ranges);
        let engine = Arc::new(ScriptedNarrativeEngine::new());
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&ranges),
            engine,
            Arc::new(HistoryLog::new()),
            Duration::from_secs(5),
        ));
        MonitoringScheduler::new(store, ranges, orchestrator, 4)
    }

    #[tokio::test]
    async fn test_alert_raised_only_for_critical_vehicle() {
        let scheduler = scheduler_over(
            vec![snapshot("VH001", 130.0), snapshot("VH002", 92.5)],
            example_ranges(),
        );

        let outcome = scheduler.sweep().await;
        assert_eq!(outcome.reports.len(), 2);
        assert_eq!(outcome.alerts.len(), 1);

        let alert = &outcome.alerts[0];
        assert_eq!(alert.vehicle_id, "VH001");
        assert_eq!(alert.critical_sensors, vec!["engine_temp_c"]);
        assert_eq!(alert.sweep_id, outcome.sweep_id);

        let vh001 = &outcome.reports[0];
        assert_eq!(vh001.verdict, HealthTier::Critical);
        let vh002 = &outcome.reports[1];
        assert_eq!(vh002.verdict, HealthTier::Normal);
    }

    fn snapshot_with_codes(id: &str, engine_temp: f64, codes: &[&str]) -> VehicleSnapshot {
        VehicleSnapshot {
            vehicle_id: id.into(),
            car_type: "EV".into(),
            sensors: BTreeMap::from([
                (
                    "engine_temp_c".to_string(),
                    SensorReading::Scalar(engine_temp),
                ),
                (
                    "dtc_codes".to_string(),
                    SensorReading::FaultCodes(codes.iter().map(|c| c.to_string()).collect()),
                ),
            ]),
        }
    }

    #[tokio::test]
    async fn test_misfire_code_alone_raises_alert() {
        // All scalars healthy; the only critical condition is a fault code,
        // which carries no reference range.
        let scheduler = scheduler_over(
            vec![snapshot_with_codes("VH001", 92.5, &["P0301"])],
            example_ranges(),
        );

        let outcome = scheduler.sweep().await;
        let report = &outcome.reports[0];
        assert_eq!(report.verdict, HealthTier::Critical);
        let obs = report
            .readings
            .iter()
            .find(|o| o.sensor == "dtc_codes")
            .expect("fault-code reading must be observed");
        assert_eq!(obs.tier, HealthTier::Critical);
        assert!(obs.value.is_none());

        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].critical_sensors, vec!["dtc_codes"]);
    }

    #[tokio::test]
    async fn test_non_critical_codes_warn_without_alert() {
        let scheduler = scheduler_over(
            vec![snapshot_with_codes("VH001", 92.5, &["P0420"])],
            example_ranges(),
        );

        let outcome = scheduler.sweep().await;
        assert_eq!(outcome.reports[0].verdict, HealthTier::Warning);
        assert!(outcome.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_alerts_are_subset_of_reports() {
        let scheduler = scheduler_over(
            vec![
                snapshot("VH001", 130.0),
                snapshot("VH002", 92.5),
                snapshot("VH003", 150.0),
            ],
            example_ranges(),
        );

        let outcome = scheduler.sweep().await;
        for alert in &outcome.alerts {
            let report = outcome
                .reports
                .iter()
                .find(|r| r.vehicle_id == alert.vehicle_id && r.sweep_id == alert.sweep_id)
                .expect("every alert must have a matching report");
            assert!(report.readings.iter().any(|o| o.tier == HealthTier::Critical));
        }
        // And the converse does not hold: VH002 has a report but no alert.
        assert!(outcome.alerts.iter().all(|a| a.vehicle_id != "VH002"));
    }

    #[tokio::test]
    async fn test_missing_vehicle_gets_failure_marker_not_abort() {
        let scheduler = scheduler_over(
            vec![snapshot("VH001", 92.5), snapshot("VH002", 92.5)],
            example_ranges(),
        );

        let ids = vec![
            "VH001".to_string(),
            "VH404".to_string(),
            "VH002".to_string(),
        ];
        let outcome = scheduler.sweep_ids(&ids).await;

        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.failed_vehicles, vec!["VH404"]);
        assert_eq!(outcome.status, SweepStatus::PartiallyFailed);
        assert_eq!(scheduler.status(), SweepStatus::PartiallyFailed);

        let failed = &outcome.reports[1];
        assert!(!failed.is_complete());
        assert!(failed.failure.as_deref().unwrap().contains("VH404"));
        // The vehicles after the failure were still evaluated.
        assert!(outcome.reports[2].is_complete());
    }

    #[tokio::test]
    async fn test_clean_sweep_completes() {
        let scheduler = scheduler_over(vec![snapshot("VH001", 92.5)], example_ranges());
        assert_eq!(scheduler.status(), SweepStatus::Idle);

        let outcome = scheduler.sweep().await;
        assert_eq!(outcome.status, SweepStatus::Completed);
        assert_eq!(scheduler.status(), SweepStatus::Completed);
        assert!(outcome.failed_vehicles.is_empty());
        assert!(outcome.reports[0].analysis.is_some());
    }

    #[tokio::test]
    async fn test_logs_accumulate_across_sweeps() {
        let scheduler = scheduler_over(vec![snapshot("VH001", 130.0)], example_ranges());
        scheduler.sweep().await;
        scheduler.sweep().await;

        assert_eq!(scheduler.reports().await.len(), 2);
        assert_eq!(scheduler.alerts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_narrative_outage_does_not_fail_the_sweep() {
        let store = Arc::new(VehicleDataStore::from_snapshots(vec![snapshot(
            "VH001", 92.5,
        )]));
        let ranges = Arc::new(example_ranges());
        let engine = Arc::new(ScriptedNarrativeEngine::new());
        engine.fail_all();
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            Arc::clone(&store),
            Arc::clone(&ranges),
            engine,
            Arc::new(HistoryLog::new()),
            Duration::from_secs(5),
        ));
        let scheduler = MonitoringScheduler::new(store, ranges, orchestrator, 2);

        let outcome = scheduler.sweep().await;
        // Classification still produced a complete, alert-capable report;
        // only the narrative sections carry error statuses.
        assert_eq!(outcome.status, SweepStatus::Completed);
        let analysis = outcome.reports[0].analysis.as_ref().unwrap();
        assert!(!analysis.diagnostic.is_success());
        assert_eq!(outcome.reports[0].verdict, HealthTier::Normal);
    }
}
