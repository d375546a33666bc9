//! Per-vehicle refresh coordinator.
//!
//! The coordinator owns the only fetch loop for its vehicle. A refresh
//! authenticates, then fetches `last_record`, then publishes the outcome:
//!
//! ```text
//! Idle -> Refreshing -> (Succeeded | Failed) -> Idle
//! ```
//!
//! Concurrent refresh requests (timer tick and manual calls) share the
//! refresh already in flight. A failed refresh never replaces the cached
//! snapshot and never stops the timer.

use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tronity_adapter_api::{BearerToken, ClientError, VehicleApi};
use tronity_core::{CoordinatorState, Credentials, RefreshError, Snapshot, VehicleId};

/// Outcome shared by every caller of one refresh.
type RefreshResult = Result<Arc<Snapshot>, RefreshError>;

/// How bearer tokens are obtained across refresh cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Authenticate before every refresh
    #[default]
    FreshPerRefresh,
    /// Keep the token until the telemetry endpoint rejects it, then
    /// authenticate again once within the same refresh
    ReuseUntilRejected,
}

impl std::str::FromStr for TokenPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fresh" => Ok(Self::FreshPerRefresh),
            "reuse" => Ok(Self::ReuseUntilRejected),
            other => Err(format!("unknown token policy {other:?} (expected fresh or reuse)")),
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Time between scheduled refreshes
    pub interval: Duration,
    /// Upper bound for each upstream request
    pub request_timeout: Duration,
    /// Token reuse across cycles
    pub token_policy: TokenPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            token_policy: TokenPolicy::FreshPerRefresh,
        }
    }
}

struct Inner {
    api: Arc<dyn VehicleApi>,
    credentials: Credentials,
    vehicle_id: VehicleId,
    config: CoordinatorConfig,
    state: watch::Sender<CoordinatorState>,
    in_flight: Mutex<Option<watch::Receiver<Option<RefreshResult>>>>,
    cached_token: Mutex<Option<BearerToken>>,
    timer: CancellationToken,
}

/// Keeps one vehicle's snapshot fresh.
///
/// Cloning is cheap; clones share the same state, timer, and in-flight
/// refresh.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("vehicle_id", &self.inner.vehicle_id)
            .field("config", &self.inner.config)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator without refreshing or arming the timer.
    #[must_use]
    pub fn new(
        api: Arc<dyn VehicleApi>,
        credentials: Credentials,
        vehicle_id: VehicleId,
        config: CoordinatorConfig,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::new(vehicle_id.clone()));

        Self {
            inner: Arc::new(Inner {
                api,
                credentials,
                vehicle_id,
                config,
                state,
                in_flight: Mutex::new(None),
                cached_token: Mutex::new(None),
                timer: CancellationToken::new(),
            }),
        }
    }

    /// Create a coordinator, run the initial refresh, and arm the timer.
    ///
    /// A failed initial refresh is a soft failure: the coordinator starts
    /// without a snapshot and the timer retries.
    pub async fn start(
        api: Arc<dyn VehicleApi>,
        credentials: Credentials,
        vehicle_id: VehicleId,
        config: CoordinatorConfig,
    ) -> Self {
        let coordinator = Self::new(api, credentials, vehicle_id, config);

        tracing::info!(
            vehicle_id = %coordinator.inner.vehicle_id,
            interval_secs = coordinator.inner.config.interval.as_secs(),
            "Starting refresh coordinator"
        );

        // Outcome is recorded in the state and logged by the refresh itself.
        let _ = coordinator.refresh_now().await;
        coordinator.arm_timer();
        coordinator
    }

    /// The vehicle this coordinator polls.
    #[must_use]
    pub fn vehicle_id(&self) -> &VehicleId {
        &self.inner.vehicle_id
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Snapshot from the most recent successful refresh.
    ///
    /// Never blocks and never touches the network.
    #[must_use]
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.state.borrow().last_snapshot.clone()
    }

    /// Copy of the current coordinator state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// Refresh now, or join the refresh already in flight.
    ///
    /// The refresh runs on its own task, so it completes and its outcome is
    /// applied even if every caller stops waiting.
    ///
    /// # Errors
    ///
    /// Returns the refresh failure. The cached snapshot is unchanged in that
    /// case.
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let mut outcome = {
            let mut in_flight = self.inner.in_flight.lock().await;
            if let Some(rx) = in_flight.as_ref() {
                tracing::debug!(vehicle_id = %self.inner.vehicle_id, "Joining in-flight refresh");
                rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                *in_flight = Some(rx.clone());

                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let refresh = tokio::spawn({
                        let inner = Arc::clone(&inner);
                        async move { inner.run_refresh().await }
                    });
                    let result = match refresh.await {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::error!(
                                vehicle_id = %inner.vehicle_id,
                                error = %err,
                                "Refresh task aborted"
                            );
                            inner.abandon_refresh();
                            Err(RefreshError::Aborted)
                        }
                    };
                    *inner.in_flight.lock().await = None;
                    tx.send_replace(Some(result));
                });

                rx
            }
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RefreshError::Aborted)?;

        (*result).clone().unwrap_or(Err(RefreshError::Aborted))
    }

    /// Disarm the timer. A refresh already in flight still completes.
    ///
    /// Calling this more than once has no further effect.
    pub fn stop(&self) {
        if self.inner.timer.is_cancelled() {
            return;
        }
        self.inner.timer.cancel();
        tracing::info!(vehicle_id = %self.inner.vehicle_id, "Refresh coordinator stopped");
    }

    /// Whether [`RefreshCoordinator::stop`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.timer.is_cancelled()
    }

    fn arm_timer(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let cancel = self.inner.timer.clone();
        let period = self.inner.config.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let coordinator = RefreshCoordinator { inner };
                        let _ = coordinator.refresh_now().await;
                    }
                }
            }

            tracing::debug!("Refresh timer exited");
        });
    }
}

impl Inner {
    async fn run_refresh(&self) -> RefreshResult {
        self.state.send_modify(CoordinatorState::begin_refresh);
        tracing::debug!(vehicle_id = %self.vehicle_id, "Refreshing snapshot");

        let result = self.fetch().await.map(Arc::new);
        let now = Utc::now();

        self.state.send_modify(|state| match &result {
            Ok(snapshot) => state.record_success(Arc::clone(snapshot), now),
            Err(error) => state.record_failure(error.clone(), now),
        });

        match &result {
            Ok(snapshot) => tracing::debug!(
                vehicle_id = %self.vehicle_id,
                fields = snapshot.len(),
                "Snapshot refreshed"
            ),
            Err(error) => tracing::warn!(
                vehicle_id = %self.vehicle_id,
                error = %error,
                "Refresh failed, keeping previous snapshot"
            ),
        }

        self.state.send_modify(CoordinatorState::finish);
        result
    }

    /// Record a refresh whose task died before publishing an outcome.
    fn abandon_refresh(&self) {
        let now = Utc::now();
        self.state.send_modify(|state| {
            state.record_failure(RefreshError::Aborted, now);
            state.finish();
        });
    }

    async fn fetch(&self) -> Result<Snapshot, RefreshError> {
        let (token, reused) = self.token().await?;

        match self.fetch_snapshot(&token).await {
            Err(ClientError::Auth { status }) if reused => {
                tracing::info!(
                    vehicle_id = %self.vehicle_id,
                    status,
                    "Cached token rejected, authenticating again"
                );
                *self.cached_token.lock().await = None;
                let (token, _) = self.token().await?;
                self.fetch_snapshot(&token).await.map_err(classify)
            }
            other => other.map_err(classify),
        }
    }

    async fn token(&self) -> Result<(BearerToken, bool), RefreshError> {
        let reuse = self.config.token_policy == TokenPolicy::ReuseUntilRejected;

        if reuse {
            if let Some(token) = self.cached_token.lock().await.clone() {
                return Ok((token, true));
            }
        }

        let token = self
            .bounded(self.api.fetch_token(&self.credentials))
            .await
            .map_err(classify)?;

        if reuse {
            *self.cached_token.lock().await = Some(token.clone());
        }

        Ok((token, false))
    }

    async fn fetch_snapshot(&self, token: &BearerToken) -> Result<Snapshot, ClientError> {
        self.bounded(self.api.fetch_snapshot(token, &self.vehicle_id))
            .await
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        let limit = self.config.request_timeout;
        tokio::time::timeout(limit, request)
            .await
            .map_err(|_| ClientError::Timeout(format!("no response within {limit:?}")))?
    }
}

/// Map a client error onto the refresh failure taxonomy.
fn classify(error: ClientError) -> RefreshError {
    let message = error.to_string();
    match error {
        ClientError::Auth { .. } | ClientError::InvalidCredentials(_) => RefreshError::Auth(message),
        ClientError::Timeout(_) => RefreshError::Timeout(message),
        ClientError::Decode(_) => RefreshError::Decode(message),
        ClientError::Init(_) | ClientError::Request(_) | ClientError::Api { .. } => {
            RefreshError::Upstream(message)
        }
    }
}
