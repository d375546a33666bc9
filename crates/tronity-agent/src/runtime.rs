//! Agent runtime orchestration.

use crate::config::AgentConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tronity_adapter_api::{TronityClient, VehicleApi};
use tronity_coordinator::{observers_for, CoordinatorHandle, VehicleObservers, VehicleRegistry};
use tronity_core::{CoordinatorState, RefreshState};

/// The main agent runtime.
pub struct Agent {
    config: AgentConfig,
    registry: VehicleRegistry,
}

impl Agent {
    /// Create an agent talking to the configured Tronity endpoints.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let client =
            TronityClient::new(config.client_config()).context("Failed to create Tronity client")?;
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// Create an agent polling through an arbitrary upstream.
    #[must_use]
    pub fn with_api(config: AgentConfig, api: Arc<dyn VehicleApi>) -> Self {
        let registry = VehicleRegistry::new(api, config.coordinator_config());
        Self { config, registry }
    }

    /// The agent's vehicle registry.
    #[must_use]
    pub fn registry(&self) -> &VehicleRegistry {
        &self.registry
    }

    /// Register the configured vehicle.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are rejected or the vehicle cannot
    /// be looked up.
    pub async fn register(&self) -> Result<CoordinatorHandle> {
        let vehicle = &self.config.vehicle;
        self.registry
            .register_vehicle(&vehicle.client_id, &vehicle.client_secret, &vehicle.vehicle_id)
            .await
            .with_context(|| format!("Failed to register vehicle {}", vehicle.vehicle_id))
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if registration fails.
    pub async fn run(self) -> Result<()> {
        let handle = self.register().await?;

        tracing::info!("Agent running, press Ctrl+C to stop");

        self.run_until(&handle, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            }
            tracing::info!("Shutdown signal received");
        })
        .await;

        Ok(())
    }

    /// Report every refresh of `handle` until `shutdown` resolves, then
    /// unregister it.
    pub async fn run_until(&self, handle: &CoordinatorHandle, shutdown: impl Future<Output = ()>) {
        let observers = observers_for(handle);
        let mut updates = handle.coordinator().subscribe();
        let mut reported = None;

        let initial = updates.borrow_and_update().clone();
        report(&observers, &initial, &mut reported);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = updates.borrow_and_update().clone();
                    report(&observers, &state, &mut reported);
                }

                () = &mut shutdown => break,
            }
        }

        self.registry.unregister_vehicle(handle.vehicle_id()).await;
        tracing::info!("Agent stopped");
    }
}

/// Log all observed values once per finished refresh.
fn report(
    observers: &VehicleObservers,
    state: &CoordinatorState,
    reported: &mut Option<DateTime<Utc>>,
) {
    if state.state != RefreshState::Idle
        || state.last_refresh.is_none()
        || state.last_refresh == *reported
    {
        return;
    }
    *reported = state.last_refresh;

    let vehicle = observers.display_name.value();

    if let Some(error) = &state.last_error {
        tracing::info!(vehicle, error = %error, "Serving stale snapshot");
    }

    for field in &observers.fields {
        match field.value() {
            Some(value) => tracing::info!(
                vehicle,
                field = field.spec().key,
                unit = field.spec().unit.unwrap_or(""),
                value = %value,
                "Field"
            ),
            None => tracing::debug!(vehicle, field = field.spec().key, "Field unavailable"),
        }
    }

    if let Some(position) = observers.position.position() {
        tracing::info!(
            vehicle,
            latitude = position.latitude,
            longitude = position.longitude,
            "Position"
        );
    }
}
