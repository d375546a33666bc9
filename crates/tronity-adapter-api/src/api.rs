//! `VehicleApi` trait - the upstream seam of the refresh coordinator.

use async_trait::async_trait;
use tronity_core::{Credentials, Snapshot, VehicleId};

use crate::client::{ClientError, TronityClient};
use crate::token::BearerToken;

/// Upstream operations needed to poll one vehicle.
///
/// Each method performs exactly one round-trip and must not mutate shared
/// state.
#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn fetch_token(&self, credentials: &Credentials) -> Result<BearerToken, ClientError>;

    /// Fetch the latest telemetry snapshot.
    async fn fetch_snapshot(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<Snapshot, ClientError>;

    /// Look up the vehicle's display name.
    async fn fetch_display_name(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<String, ClientError>;
}

#[async_trait]
impl VehicleApi for TronityClient {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<BearerToken, ClientError> {
        TronityClient::fetch_token(self, credentials).await
    }

    async fn fetch_snapshot(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<Snapshot, ClientError> {
        TronityClient::fetch_snapshot(self, token, vehicle_id).await
    }

    async fn fetch_display_name(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<String, ClientError> {
        TronityClient::fetch_display_name(self, token, vehicle_id).await
    }
}
