//! # Tronity Core
//!
//! Data model shared by every Tronity telemetry crate.
//!
//! This crate provides:
//! - Vehicle identity and client credentials
//! - Immutable telemetry snapshots with scalar field values
//! - The declarative field table (units, device classes, icons)
//! - The per-vehicle refresh state and its transitions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod field;
pub mod snapshot;
pub mod state;

pub use field::{field_spec, DeviceClass, FieldSpec, StateClass, FIELDS};
pub use snapshot::{Credentials, CredentialsError, FieldValue, Snapshot, SnapshotError, VehicleId};
pub use state::{CoordinatorState, RefreshError, RefreshState};
