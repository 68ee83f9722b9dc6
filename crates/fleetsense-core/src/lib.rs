//! Fleetsense Core Library
//!
//! Sensor classification, multi-domain analysis orchestration, append-only
//! analysis history, and periodic fleet monitoring sweeps. Narrative
//! generation is an injected capability ([`NarrativeEngine`]); the core
//! produces correct tiers, metrics and error-shaped results even when it is
//! unreachable.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod fakes;
pub mod history;
pub mod monitor;
pub mod narrative;
pub mod orchestrator;
pub mod ranges;
pub mod router;
pub mod snapshot;
pub mod store;
pub mod telemetry;

pub use analyzer::{AnalysisDomain, DomainAnalyzer, DomainResult, DomainStatus};
pub use config::{FleetConfig, NarrativeConfig};
pub use error::{FleetError, Result};
pub use history::{AnalysisLogEntry, AnalysisRecord, HistoryLog, DEFAULT_HISTORY_LIMIT};
pub use monitor::{
    Alert, MonitoringReport, MonitoringScheduler, SensorObservation, SweepOutcome, SweepStatus,
};
pub use narrative::{HttpNarrativeEngine, NarrativeEngine, NarrativeError, NarrativeRequest};
pub use orchestrator::{AnalysisOrchestrator, ComprehensiveReport, SingleAnalysis};
pub use ranges::{HealthTier, RangeSpec, RangeTable, CRITICAL_FAULT_CODES};
pub use router::route_query;
pub use snapshot::{SensorReading, VehicleSnapshot};
pub use store::VehicleDataStore;
pub use telemetry::init_tracing;

/// Fleetsense version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
