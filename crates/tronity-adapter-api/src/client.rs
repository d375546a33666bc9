//! HTTP client for the Tronity API.
//!
//! Every call is a single request with no retry; retry policy belongs to
//! the caller. Requests are bounded by the client-wide timeout.

use crate::token::{BearerToken, TokenResponse, VehicleInfo};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tronity_core::{Credentials, Snapshot, VehicleId};
use url::Url;

/// Default authentication endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://api.tronity.tech/authentication";

/// Default vehicles collection.
pub const DEFAULT_VEHICLES_URL: &str = "https://api.tronity.tech/tronity/vehicles";

/// Characters escaped when a vehicle id is placed in a path segment.
const PATH_SEGMENT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Tronity client configuration.
#[derive(Debug, Clone)]
pub struct TronityClientConfig {
    /// Authentication endpoint
    pub auth_url: String,
    /// Vehicles collection URL (no trailing slash needed)
    pub vehicles_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for TronityClientConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            vehicles_url: DEFAULT_VEHICLES_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for Tronity authentication and telemetry.
#[derive(Debug, Clone)]
pub struct TronityClient {
    client: Client,
    config: TronityClientConfig,
}

impl TronityClient {
    /// Create a new Tronity client.
    ///
    /// # Errors
    ///
    /// Returns error if a configured URL is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: TronityClientConfig) -> Result<Self, ClientError> {
        for url in [&config.auth_url, &config.vehicles_url] {
            Url::parse(url).map_err(|e| ClientError::Init(format!("invalid URL {url}: {e}")))?;
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TronityClientConfig {
        &self.config
    }

    fn vehicle_url(&self, vehicle_id: &VehicleId) -> String {
        format!(
            "{}/{}",
            self.config.vehicles_url.trim_end_matches('/'),
            utf8_percent_encode(vehicle_id.as_str(), PATH_SEGMENT_ESCAPE)
        )
    }

    /// Exchange client credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidCredentials`] for empty credentials,
    /// [`ClientError::Auth`] unless the endpoint answers 200 or 201 with an
    /// `access_token`, and [`ClientError::Timeout`] or
    /// [`ClientError::Request`] on transport failure.
    pub async fn fetch_token(&self, credentials: &Credentials) -> Result<BearerToken, ClientError> {
        credentials
            .validate()
            .map_err(|e| ClientError::InvalidCredentials(e.to_string()))?;

        tracing::debug!(url = %self.config.auth_url, "POST authentication");

        let response = self
            .client
            .post(&self.config.auth_url)
            .form(&[
                ("client_id", credentials.client_id()),
                ("client_secret", credentials.client_secret()),
                ("grant_type", "app"),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(ClientError::Auth {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = match decode_json(response).await {
            Ok(body) => body,
            Err(ClientError::Decode(message)) => {
                tracing::debug!(error = %message, "Unparsable authentication response");
                return Err(ClientError::Auth {
                    status: status.as_u16(),
                });
            }
            Err(other) => return Err(other),
        };

        Ok(BearerToken::new(body.access_token))
    }

    /// Fetch the latest telemetry record of a vehicle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if the token is rejected,
    /// [`ClientError::Timeout`] if no response arrives in time,
    /// [`ClientError::Decode`] if the body is not a JSON object, and
    /// [`ClientError::Api`] for any other error status.
    pub async fn fetch_snapshot(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<Snapshot, ClientError> {
        let url = format!("{}/last_record", self.vehicle_url(vehicle_id));

        tracing::debug!(%vehicle_id, url, "GET last_record");

        let response = self.get_authorized(&url, token).await?;
        let body: serde_json::Value = decode_json(response).await?;

        Snapshot::from_json(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Look up the human-readable name of a vehicle.
    ///
    /// # Errors
    ///
    /// Same classification as [`TronityClient::fetch_snapshot`].
    pub async fn fetch_display_name(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<String, ClientError> {
        let url = self.vehicle_url(vehicle_id);

        tracing::debug!(%vehicle_id, url, "GET vehicle");

        let response = self.get_authorized(&url, token).await?;
        let info: VehicleInfo = decode_json(response).await?;

        Ok(info.display_name)
    }

    async fn get_authorized(&self, url: &str, token: &BearerToken) -> Result<Response, ClientError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, token.authorization())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Auth {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response)
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(err.to_string())
    } else {
        ClientError::Request(err.to_string())
    }
}

/// Read the whole body and parse it as JSON.
///
/// The body is read as bytes first so a non-JSON payload is reported as a
/// decode failure rather than a transport failure.
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Errors that can occur with the Tronity client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Client initialization failed
    #[error("client init error: {0}")]
    Init(String),
    /// Credentials rejected before sending
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// Credentials or token rejected by the API
    #[error("authentication rejected (status {status})")]
    Auth {
        /// HTTP status code
        status: u16,
    },
    /// No response within the request timeout
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
    /// HTTP request failed
    #[error("request error: {0}")]
    Request(String),
    /// API returned an error status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from API
        message: String,
    },
}

impl ClientError {
    /// Whether the error means the credentials or token were refused.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::InvalidCredentials(_))
    }
}
