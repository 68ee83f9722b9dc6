//! Read-only accessor over the fleet's vehicle snapshots.
//!
//! The dataset is loaded once at startup and never mutated afterwards; the
//! store can therefore be shared across concurrent analyses behind an `Arc`
//! without synchronization.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{FleetError, Result};
use crate::snapshot::{SensorReading, VehicleSnapshot};

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    vehicles: Vec<VehicleSnapshot>,
}

/// In-memory fleet store. Insertion order of the backing dataset is
/// preserved for [`VehicleDataStore::vehicle_ids`].
#[derive(Debug)]
pub struct VehicleDataStore {
    vehicles: Vec<VehicleSnapshot>,
    by_id: HashMap<String, usize>,
}

impl VehicleDataStore {
    /// Load the JSON dataset (`{"vehicles": [...]}`) from disk.
    ///
    /// A missing or malformed dataset is a startup error; there is no silent
    /// empty-fleet fallback.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FleetError::DatasetUnreadable {
            path: path.display().to_string(),
            source,
        })?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        let store = Self::from_snapshots(dataset.vehicles);
        info!(
            event = "store.loaded",
            path = %path.display(),
            vehicles = store.len(),
        );
        Ok(store)
    }

    /// Build a store directly from snapshots (tests, embedding).
    pub fn from_snapshots(vehicles: Vec<VehicleSnapshot>) -> Self {
        let by_id = vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| (v.vehicle_id.clone(), i))
            .collect();
        Self { vehicles, by_id }
    }

    /// Fetch one vehicle's snapshot.
    pub fn get(&self, vehicle_id: &str) -> Result<&VehicleSnapshot> {
        self.by_id
            .get(vehicle_id)
            .map(|&i| &self.vehicles[i])
            .ok_or_else(|| FleetError::VehicleNotFound(vehicle_id.to_string()))
    }

    /// All vehicle ids, in dataset insertion order.
    pub fn vehicle_ids(&self) -> Vec<String> {
        self.vehicles.iter().map(|v| v.vehicle_id.clone()).collect()
    }

    /// Readings restricted to the requested sensor names. Names absent from
    /// the snapshot are silently omitted; callers treat omission as an
    /// unknown tier, never as zero.
    pub fn get_fields(
        &self,
        vehicle_id: &str,
        names: &[&str],
    ) -> Result<BTreeMap<String, SensorReading>> {
        let snapshot = self.get(vehicle_id)?;
        Ok(names
            .iter()
            .filter_map(|name| {
                snapshot
                    .sensors
                    .get(*name)
                    .map(|r| (name.to_string(), r.clone()))
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
