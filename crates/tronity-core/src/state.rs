//! Per-vehicle refresh state.
//!
//! [`CoordinatorState`] is the value a coordinator publishes to its
//! subscribers. Transitions are plain methods so they can be checked without
//! a runtime:
//!
//! ```text
//! Idle -> Refreshing -> (Succeeded | Failed) -> Idle
//! ```

use crate::snapshot::{Snapshot, VehicleId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// No refresh in flight
    #[default]
    Idle,
    /// A refresh is awaiting the upstream
    Refreshing,
    /// The last refresh produced a new snapshot
    Succeeded,
    /// The last refresh failed; the previous snapshot is kept
    Failed,
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "idle"),
            RefreshState::Refreshing => write!(f, "refreshing"),
            RefreshState::Succeeded => write!(f, "succeeded"),
            RefreshState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a refresh failed.
///
/// All variants are soft failures for a running coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RefreshError {
    /// Credentials or token rejected
    #[error("authentication failed: {0}")]
    Auth(String),
    /// No response within the request bound
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Body was not a structured record
    #[error("could not decode response: {0}")]
    Decode(String),
    /// Transport failure or unexpected status
    #[error("upstream error: {0}")]
    Upstream(String),
    /// The refresh task ended without reporting a result
    #[error("refresh aborted")]
    Aborted,
}

/// State owned by one coordinator and shared read-only with observers.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorState {
    /// The vehicle being polled
    pub vehicle_id: VehicleId,
    /// Current phase
    pub state: RefreshState,
    /// Snapshot from the most recent successful refresh
    pub last_snapshot: Option<Arc<Snapshot>>,
    /// Error from the most recent refresh, cleared on success
    pub last_error: Option<RefreshError>,
    /// When the most recent refresh finished
    pub last_refresh: Option<DateTime<Utc>>,
    /// When the most recent successful refresh finished
    pub last_success: Option<DateTime<Utc>>,
}

impl CoordinatorState {
    /// Fresh state with no snapshot.
    #[must_use]
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id,
            state: RefreshState::Idle,
            last_snapshot: None,
            last_error: None,
            last_refresh: None,
            last_success: None,
        }
    }

    /// `Idle -> Refreshing`.
    pub fn begin_refresh(&mut self) {
        self.state = RefreshState::Refreshing;
    }

    /// `Refreshing -> Succeeded`, replacing the snapshot wholesale.
    pub fn record_success(&mut self, snapshot: Arc<Snapshot>, at: DateTime<Utc>) {
        self.state = RefreshState::Succeeded;
        self.last_snapshot = Some(snapshot);
        self.last_error = None;
        self.last_refresh = Some(at);
        self.last_success = Some(at);
    }

    /// `Refreshing -> Failed`. The previous snapshot is left untouched.
    pub fn record_failure(&mut self, error: RefreshError, at: DateTime<Utc>) {
        self.state = RefreshState::Failed;
        self.last_error = Some(error);
        self.last_refresh = Some(at);
    }

    /// `Succeeded | Failed -> Idle`.
    pub fn finish(&mut self) {
        self.state = RefreshState::Idle;
    }

    /// Whether the last finished refresh failed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}
