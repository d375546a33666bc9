//! # Tronity Coordinator
//!
//! Keeps one vehicle's telemetry fresh and hands it out to observers.
//!
//! ## Refresh model
//!
//! Each registered vehicle owns one [`RefreshCoordinator`]. It polls the
//! upstream on a fixed interval, allows at most one refresh in flight, and
//! keeps the last good snapshot when a refresh fails. Observers only ever
//! read the cached snapshot; they never reach the network.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod observer;
pub mod registry;

#[cfg(test)]
mod testing;

pub use coordinator::{CoordinatorConfig, RefreshCoordinator, TokenPolicy};
pub use observer::{
    observers_for, read_field, DisplayNameObserver, FieldObserver, Position, PositionObserver,
    VehicleObservers,
};
pub use registry::{CoordinatorHandle, RegistrationError, VehicleRegistry};
