//! Error taxonomy for the fleetsense core.
//!
//! Data-layer errors (`VehicleNotFound`, dataset loading) propagate to the
//! immediate caller. Narrative-engine failures are captured at the analyzer
//! boundary and become `DomainResult` error statuses; they only appear here
//! when a caller explicitly bubbles a [`NarrativeError`].

use crate::narrative::NarrativeError;

/// Fleetsense core errors.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("vehicle not found: {0}")]
    VehicleNotFound(String),

    #[error("dataset unreadable at {path}: {source}")]
    DatasetUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset format error: {0}")]
    DatasetFormat(#[from] serde_json::Error),

    #[error("narrative engine error: {0}")]
    Narrative(#[from] NarrativeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fleetsense core operations.
pub type Result<T> = std::result::Result<T, FleetError>;
