//! Scripted in-memory upstream for coordinator tests.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tronity_adapter_api::{BearerToken, ClientError, VehicleApi};
use tronity_core::{Credentials, Snapshot, VehicleId};

/// What the next `last_record` request answers.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A snapshot with `level` set to the given value
    Level(i64),
    /// A snapshot decoded from this body
    Body(serde_json::Value),
    /// A snapshot after a delay
    Delayed(Duration, i64),
    /// Never answers
    Hang,
    /// Body is not JSON
    NotJson,
    /// Token rejected
    Unauthorized,
    /// The request handler panics
    Panic,
}

pub struct FakeApi {
    replies: Mutex<VecDeque<Reply>>,
    valid_secret: String,
    display_name: String,
    tokens_issued: AtomicUsize,
    revoked_below: AtomicUsize,
    snapshot_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            valid_secret: "secret".to_string(),
            display_name: "Family Car".to_string(),
            tokens_issued: AtomicUsize::new(0),
            revoked_below: AtomicUsize::new(0),
            snapshot_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn tokens_issued(&self) -> usize {
        self.tokens_issued.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Reject every token issued so far.
    pub fn revoke_tokens(&self) {
        self.revoked_below
            .store(self.tokens_issued(), Ordering::SeqCst);
    }

    fn token_is_valid(&self, token: &BearerToken) -> bool {
        token
            .value()
            .strip_prefix("tok-")
            .and_then(|n| n.parse::<usize>().ok())
            .is_some_and(|n| n > self.revoked_below.load(Ordering::SeqCst))
    }

    async fn answer(&self, reply: Reply) -> Result<Snapshot, ClientError> {
        match reply {
            Reply::Level(level) => Ok(level_snapshot(level)),
            Reply::Body(body) => {
                Snapshot::from_json(&body).map_err(|e| ClientError::Decode(e.to_string()))
            }
            Reply::Delayed(delay, level) => {
                tokio::time::sleep(delay).await;
                Ok(level_snapshot(level))
            }
            Reply::Hang => std::future::pending().await,
            Reply::NotJson => Err(ClientError::Decode(
                "expected value at line 1 column 1".to_string(),
            )),
            Reply::Unauthorized => Err(ClientError::Auth { status: 401 }),
            Reply::Panic => panic!("upstream handler panicked"),
        }
    }
}

pub fn level_snapshot(level: i64) -> Snapshot {
    Snapshot::from_json(&json!({"level": level, "charging": false})).unwrap()
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VehicleApi for FakeApi {
    async fn fetch_token(&self, credentials: &Credentials) -> Result<BearerToken, ClientError> {
        if credentials.client_secret() != self.valid_secret {
            return Err(ClientError::Auth { status: 401 });
        }
        let n = self.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BearerToken::new(format!("tok-{n}")))
    }

    async fn fetch_snapshot(
        &self,
        token: &BearerToken,
        _vehicle_id: &VehicleId,
    ) -> Result<Snapshot, ClientError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.token_is_valid(token) {
            return Err(ClientError::Auth { status: 401 });
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Level(50));
        self.answer(reply).await
    }

    async fn fetch_display_name(
        &self,
        token: &BearerToken,
        vehicle_id: &VehicleId,
    ) -> Result<String, ClientError> {
        if !self.token_is_valid(token) {
            return Err(ClientError::Auth { status: 401 });
        }
        if vehicle_id.as_str() == "missing" {
            return Err(ClientError::Api {
                status: 404,
                message: "vehicle not found".to_string(),
            });
        }
        Ok(self.display_name.clone())
    }
}
