//! Vehicle registration and teardown.
//!
//! The registry owns one coordinator per registered vehicle. Observers get
//! a [`CoordinatorHandle`] handed to them at construction; there is no
//! ambient lookup.

use crate::coordinator::{CoordinatorConfig, RefreshCoordinator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tronity_adapter_api::{ClientError, VehicleApi};
use tronity_core::{Credentials, FieldValue, Snapshot, VehicleId};

/// A registered vehicle: its coordinator plus the name shown to users.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    display_name: Arc<str>,
    coordinator: RefreshCoordinator,
}

impl CoordinatorHandle {
    /// The registered vehicle.
    #[must_use]
    pub fn vehicle_id(&self) -> &VehicleId {
        self.coordinator.vehicle_id()
    }

    /// Human-readable name from the identity lookup.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The vehicle's coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Current snapshot, if any refresh has succeeded.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.coordinator.current_snapshot()
    }

    /// Read one field of the current snapshot. `None` means unavailable.
    #[must_use]
    pub fn read_field(&self, field: &str) -> Option<FieldValue> {
        self.current_snapshot()
            .and_then(|snapshot| snapshot.get(field).cloned())
    }
}

/// Registered vehicles keyed by id.
pub struct VehicleRegistry {
    api: Arc<dyn VehicleApi>,
    config: CoordinatorConfig,
    vehicles: RwLock<HashMap<VehicleId, CoordinatorHandle>>,
}

impl VehicleRegistry {
    /// Create an empty registry that polls through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn VehicleApi>, config: CoordinatorConfig) -> Self {
        Self {
            api,
            config,
            vehicles: RwLock::new(HashMap::new()),
        }
    }

    /// Validate credentials, look up the display name, and start polling.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidAuth`] if the credentials or the
    /// issued token are rejected, [`RegistrationError::AlreadyRegistered`]
    /// if the vehicle is already polled, and [`RegistrationError::Unknown`]
    /// for any other failure. Nothing is stored on error.
    pub async fn register_vehicle(
        &self,
        client_id: &str,
        client_secret: &str,
        vehicle_id: &str,
    ) -> Result<CoordinatorHandle, RegistrationError> {
        let vehicle_id = VehicleId::new(vehicle_id);
        if self.vehicles.read().await.contains_key(&vehicle_id) {
            return Err(RegistrationError::AlreadyRegistered(vehicle_id));
        }

        let credentials = Credentials::new(client_id, client_secret);

        let token = self
            .api
            .fetch_token(&credentials)
            .await
            .map_err(registration_error)?;
        let display_name = self
            .api
            .fetch_display_name(&token, &vehicle_id)
            .await
            .map_err(registration_error)?;

        tracing::info!(%vehicle_id, display_name = %display_name, "Vehicle credentials validated");

        let coordinator = RefreshCoordinator::start(
            Arc::clone(&self.api),
            credentials,
            vehicle_id.clone(),
            self.config.clone(),
        )
        .await;

        let handle = CoordinatorHandle {
            display_name: Arc::from(display_name),
            coordinator,
        };

        let mut vehicles = self.vehicles.write().await;
        if vehicles.contains_key(&vehicle_id) {
            // Lost a race with a concurrent registration of the same vehicle.
            handle.coordinator.stop();
            return Err(RegistrationError::AlreadyRegistered(vehicle_id));
        }
        vehicles.insert(vehicle_id, handle.clone());

        Ok(handle)
    }

    /// Stop a vehicle's coordinator and forget it.
    ///
    /// Returns `false` if the vehicle was not registered.
    pub async fn unregister_vehicle(&self, vehicle_id: &VehicleId) -> bool {
        let Some(handle) = self.vehicles.write().await.remove(vehicle_id) else {
            return false;
        };

        handle.coordinator.stop();
        tracing::info!(%vehicle_id, "Vehicle unregistered");
        true
    }

    /// Look up a registered vehicle.
    pub async fn get(&self, vehicle_id: &VehicleId) -> Option<CoordinatorHandle> {
        self.vehicles.read().await.get(vehicle_id).cloned()
    }

    /// Ids of all registered vehicles.
    pub async fn vehicle_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<_> = self.vehicles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Unregister every vehicle.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.vehicles.write().await.drain().collect();
        for (vehicle_id, handle) in drained {
            handle.coordinator.stop();
            tracing::info!(%vehicle_id, "Vehicle unregistered");
        }
    }
}

fn registration_error(error: ClientError) -> RegistrationError {
    if error.is_auth() {
        RegistrationError::InvalidAuth(error.to_string())
    } else {
        RegistrationError::Unknown(error.to_string())
    }
}

/// Errors rejecting a registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// Credentials were rejected
    #[error("invalid authentication: {0}")]
    InvalidAuth(String),
    /// The vehicle already has a coordinator
    #[error("vehicle {0} is already registered")]
    AlreadyRegistered(VehicleId),
    /// Any other failure during validation
    #[error("registration failed: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, Reply};
    use std::time::Duration;

    fn registry(api: &Arc<FakeApi>) -> VehicleRegistry {
        VehicleRegistry::new(
            Arc::clone(api) as Arc<dyn VehicleApi>,
            CoordinatorConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn register_with_valid_credentials() {
        let api = Arc::new(FakeApi::new([Reply::Level(87)]));
        let registry = registry(&api);

        let handle = registry
            .register_vehicle("id", "secret", "veh-1")
            .await
            .unwrap();

        assert_eq!(handle.vehicle_id().as_str(), "veh-1");
        assert!(!handle.display_name().is_empty());
        assert_eq!(handle.read_field("level"), Some(FieldValue::Integer(87)));
        assert!(registry.get(&VehicleId::new("veh-1")).await.is_some());

        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn register_with_invalid_credentials() {
        let api = Arc::new(FakeApi::new([]));
        let registry = registry(&api);

        let err = registry
            .register_vehicle("id", "wrong", "veh-1")
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::InvalidAuth(_)));
        assert!(registry.vehicle_ids().await.is_empty());
        assert_eq!(api.snapshot_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn register_with_empty_credentials() {
        let registry = registry(&Arc::new(FakeApi::new([])));
        let err = registry.register_vehicle("", "", "veh-1").await.unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidAuth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn register_unknown_vehicle() {
        let api = Arc::new(FakeApi::new([]));
        let registry = registry(&api);

        let err = registry
            .register_vehicle("id", "secret", "missing")
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Unknown(_)));
        assert!(registry.vehicle_ids().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn register_twice_rejected() {
        let api = Arc::new(FakeApi::new([]));
        let registry = registry(&api);

        registry
            .register_vehicle("id", "secret", "veh-1")
            .await
            .unwrap();
        let err = registry
            .register_vehicle("id", "secret", "veh-1")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::AlreadyRegistered(VehicleId::new("veh-1"))
        );
        registry.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_leaves_other_vehicles_polling() {
        let api = Arc::new(FakeApi::new([]));
        let registry = registry(&api);

        let first = registry
            .register_vehicle("id", "secret", "veh-1")
            .await
            .unwrap();
        let second = registry
            .register_vehicle("id", "secret", "veh-2")
            .await
            .unwrap();
        assert_eq!(api.snapshot_calls(), 2);

        assert!(registry.unregister_vehicle(first.vehicle_id()).await);
        assert!(!registry.unregister_vehicle(first.vehicle_id()).await);
        assert!(first.coordinator().is_stopped());
        assert!(!second.coordinator().is_stopped());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(api.snapshot_calls(), 3);
        assert_eq!(registry.vehicle_ids().await, vec![VehicleId::new("veh-2")]);

        registry.shutdown().await;
        assert!(second.coordinator().is_stopped());
    }
}
