//! Read-only projections of a vehicle's snapshot.
//!
//! One [`FieldObserver`] per entry of the field table, plus the display
//! name and the GPS position. Observers read the coordinator's cached
//! snapshot and report `None` when a value is unavailable.

use crate::registry::CoordinatorHandle;
use serde::Serialize;
use tronity_core::field::{LATITUDE, LONGITUDE};
use tronity_core::{FieldSpec, FieldValue, FIELDS};

/// Read one field of a vehicle's current snapshot.
///
/// Returns `None` before the first successful refresh or when the field is
/// missing from the snapshot.
#[must_use]
pub fn read_field(handle: &CoordinatorHandle, field: &str) -> Option<FieldValue> {
    handle.read_field(field)
}

/// Projection of one telemetry field.
#[derive(Debug, Clone)]
pub struct FieldObserver {
    handle: CoordinatorHandle,
    spec: &'static FieldSpec,
}

impl FieldObserver {
    /// Observe the field described by `spec`.
    #[must_use]
    pub fn new(handle: CoordinatorHandle, spec: &'static FieldSpec) -> Self {
        Self { handle, spec }
    }

    /// Observe a field of the field table by key.
    #[must_use]
    pub fn for_key(handle: CoordinatorHandle, key: &str) -> Option<Self> {
        tronity_core::field_spec(key).map(|spec| Self::new(handle, spec))
    }

    /// Field metadata.
    #[must_use]
    pub fn spec(&self) -> &'static FieldSpec {
        self.spec
    }

    /// Stable identifier, `{vehicle_id}_{key}`.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.handle.vehicle_id(), self.spec.key)
    }

    /// Display name, `tronity.{display_name}.{key}`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("tronity.{}.{}", self.handle.display_name(), self.spec.key)
    }

    /// Current value, or `None` if unavailable.
    #[must_use]
    pub fn value(&self) -> Option<FieldValue> {
        self.handle.read_field(self.spec.key)
    }
}

/// The vehicle's display name as an observable value.
#[derive(Debug, Clone)]
pub struct DisplayNameObserver {
    handle: CoordinatorHandle,
}

impl DisplayNameObserver {
    /// Icon shown next to the name.
    pub const ICON: &'static str = "mdi:car";

    /// Observe the display name of a registered vehicle.
    #[must_use]
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self { handle }
    }

    /// Stable identifier, `{vehicle_id}_display_name`.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}_display_name", self.handle.vehicle_id())
    }

    /// Display name of this observer.
    #[must_use]
    pub fn name(&self) -> &'static str {
        "tronity.display_name"
    }

    /// The vehicle's display name.
    #[must_use]
    pub fn value(&self) -> &str {
        self.handle.display_name()
    }
}

/// A GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

/// Device tracker combining latitude and longitude.
#[derive(Debug, Clone)]
pub struct PositionObserver {
    handle: CoordinatorHandle,
}

impl PositionObserver {
    /// Icon shown next to the tracker.
    pub const ICON: &'static str = "mdi:map";

    /// Observe the position of a registered vehicle.
    #[must_use]
    pub fn new(handle: CoordinatorHandle) -> Self {
        Self { handle }
    }

    /// Stable identifier, `{vehicle_id}_device_tracker`.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!("{}_device_tracker", self.handle.vehicle_id())
    }

    /// Display name of the tracker, same as its identifier.
    #[must_use]
    pub fn name(&self) -> String {
        self.unique_id()
    }

    /// Where the position comes from.
    #[must_use]
    pub fn source_type(&self) -> &'static str {
        "gps"
    }

    /// Current position; `None` unless both coordinates are numeric.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        let snapshot = self.handle.current_snapshot()?;
        Some(Position {
            latitude: snapshot.get(LATITUDE)?.as_f64()?,
            longitude: snapshot.get(LONGITUDE)?.as_f64()?,
        })
    }
}

/// Every observer of one vehicle.
#[derive(Debug, Clone)]
pub struct VehicleObservers {
    /// Display name
    pub display_name: DisplayNameObserver,
    /// GPS position
    pub position: PositionObserver,
    /// One observer per field table entry
    pub fields: Vec<FieldObserver>,
}

/// Build the full observer set of a registered vehicle.
#[must_use]
pub fn observers_for(handle: &CoordinatorHandle) -> VehicleObservers {
    VehicleObservers {
        display_name: DisplayNameObserver::new(handle.clone()),
        position: PositionObserver::new(handle.clone()),
        fields: FIELDS
            .iter()
            .map(|spec| FieldObserver::new(handle.clone(), spec))
            .collect(),
    }
}
