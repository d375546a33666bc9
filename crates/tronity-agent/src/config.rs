//! Agent configuration.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tronity_adapter_api::client::{DEFAULT_AUTH_URL, DEFAULT_VEHICLES_URL};
use tronity_adapter_api::TronityClientConfig;
use tronity_coordinator::{CoordinatorConfig, TokenPolicy};
use url::Url;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Vehicle to register
    pub vehicle: VehicleConfig,

    /// Upstream API configuration
    pub api: ApiConfig,

    /// Polling configuration
    pub polling: PollingConfig,
}

/// The vehicle and the credentials used to poll it.
#[derive(Clone)]
pub struct VehicleConfig {
    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Vehicle identifier
    pub vehicle_id: String,
}

impl std::fmt::Debug for VehicleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("vehicle_id", &self.vehicle_id)
            .finish()
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Authentication endpoint
    pub auth_url: String,

    /// Vehicles collection URL
    pub vehicles_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

/// Polling configuration.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Time between refreshes
    pub interval: Duration,

    /// Token reuse across refreshes
    pub token_policy: TokenPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig {
                client_id: String::new(),
                client_secret: String::new(),
                vehicle_id: String::new(),
            },
            api: ApiConfig {
                auth_url: DEFAULT_AUTH_URL.to_string(),
                vehicles_url: DEFAULT_VEHICLES_URL.to_string(),
                timeout: Duration::from_secs(30),
            },
            polling: PollingConfig {
                interval: Duration::from_secs(60),
                token_policy: TokenPolicy::FreshPerRefresh,
            },
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TRONITY_CLIENT_ID`: OAuth client id (required)
    /// - `TRONITY_CLIENT_SECRET`: OAuth client secret (required)
    /// - `TRONITY_VEHICLE_ID`: Vehicle identifier (required)
    /// - `TRONITY_AUTH_URL`: Authentication endpoint
    /// - `TRONITY_VEHICLES_URL`: Vehicles collection URL
    /// - `TRONITY_POLL_INTERVAL_SECS`: Seconds between refreshes
    /// - `TRONITY_TIMEOUT_SECS`: Per-request timeout in seconds
    /// - `TRONITY_TOKEN_POLICY`: `fresh` or `reuse`
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AgentConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        let required = |key: &str| -> Result<String> {
            match lookup(key) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                _ => bail!("{key} must be set"),
            }
        };

        config.vehicle.client_id = required("TRONITY_CLIENT_ID")?;
        config.vehicle.client_secret = required("TRONITY_CLIENT_SECRET")?;
        config.vehicle.vehicle_id = required("TRONITY_VEHICLE_ID")?;

        if let Some(url) = lookup("TRONITY_AUTH_URL") {
            Url::parse(&url).context("Invalid TRONITY_AUTH_URL")?;
            config.api.auth_url = url;
        }

        if let Some(url) = lookup("TRONITY_VEHICLES_URL") {
            Url::parse(&url).context("Invalid TRONITY_VEHICLES_URL")?;
            config.api.vehicles_url = url;
        }

        if let Some(secs) = lookup("TRONITY_POLL_INTERVAL_SECS") {
            config.polling.interval =
                positive_secs(&secs).context("Invalid TRONITY_POLL_INTERVAL_SECS")?;
        }

        if let Some(secs) = lookup("TRONITY_TIMEOUT_SECS") {
            config.api.timeout = positive_secs(&secs).context("Invalid TRONITY_TIMEOUT_SECS")?;
        }

        if let Some(policy) = lookup("TRONITY_TOKEN_POLICY") {
            config.polling.token_policy = policy
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid TRONITY_TOKEN_POLICY")?;
        }

        Ok(config)
    }

    /// Client configuration derived from this config.
    #[must_use]
    pub fn client_config(&self) -> TronityClientConfig {
        TronityClientConfig {
            auth_url: self.api.auth_url.clone(),
            vehicles_url: self.api.vehicles_url.clone(),
            timeout: self.api.timeout,
        }
    }

    /// Coordinator configuration derived from this config.
    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            interval: self.polling.interval,
            request_timeout: self.api.timeout,
            token_policy: self.polling.token_policy,
        }
    }
}

fn positive_secs(value: &str) -> Result<Duration> {
    let secs: u64 = value.trim().parse().context("not a whole number of seconds")?;
    if secs == 0 {
        bail!("must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
