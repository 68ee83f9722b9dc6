//! Vehicle snapshot records as loaded from the telemetry dataset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single sensor reading: either a scalar value or a list of fault codes.
///
/// Untagged so the dataset's mixed JSON values (`92.5` vs `["P0420"]`)
/// deserialize directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorReading {
    Scalar(f64),
    FaultCodes(Vec<String>),
}

impl SensorReading {
    /// Scalar value, if this reading is numeric.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            SensorReading::Scalar(v) => Some(*v),
            SensorReading::FaultCodes(_) => None,
        }
    }

    /// Fault-code list, if this reading is one.
    pub fn as_fault_codes(&self) -> Option<&[String]> {
        match self {
            SensorReading::Scalar(_) => None,
            SensorReading::FaultCodes(codes) => Some(codes),
        }
    }
}

impl From<f64> for SensorReading {
    fn from(v: f64) -> Self {
        SensorReading::Scalar(v)
    }
}

/// One vehicle's sensor snapshot. Immutable once loaded; analyzers only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    /// Unique vehicle identifier, e.g. "VH001".
    pub vehicle_id: String,
    /// Vehicle category. Open set: "EV", "hybrid", "sedan", ...
    #[serde(default)]
    pub car_type: String,
    /// Sensor name to latest reading.
    #[serde(default, alias = "available_sensor_fields")]
    pub sensors: BTreeMap<String, SensorReading>,
}

impl VehicleSnapshot {
    pub fn reading(&self, sensor: &str) -> Option<&SensorReading> {
        self.sensors.get(sensor)
    }

    pub fn scalar(&self, sensor: &str) -> Option<f64> {
        self.sensors.get(sensor).and_then(SensorReading::as_scalar)
    }
}
