//! Pub/sub over Redis.
//!
//! Every event is published as a JSON envelope on `{namespace}:{channel}`.
//! WebSocket clients of `/ws/updates` receive everything under the namespace
//! through a pattern subscription.

use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::Serialize;
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use super::{AlertPublisher, CollaboratorError};

const COLLABORATOR: &str = "redis-pubsub";

pub type UpdateStream = Pin<Box<dyn Stream<Item = String> + Send>>;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    channel: &'a str,
    event: &'a str,
    data: &'a serde_json::Value,
}

pub fn channel_key(namespace: &str, channel: &str) -> String {
    format!("{namespace}:{channel}")
}

#[derive(Clone)]
pub struct RedisBroadcaster {
    connection: ConnectionManager,
    namespace: String,
}

impl RedisBroadcaster {
    pub fn new(connection: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            connection,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl AlertPublisher for RedisBroadcaster {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        let message = serde_json::to_string(&Envelope {
            channel,
            event,
            data: &payload,
        })
        .map_err(CollaboratorError::malformed(COLLABORATOR))?;

        let key = channel_key(&self.namespace, channel);
        let mut connection = self.connection.clone();
        let receivers: u64 = connection
            .publish(&key, message)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        debug!(channel = %key, event, receivers, "published");
        Ok(())
    }
}

/// Reconnect schedule for the update relay: doubles from `base` up to `cap`,
/// giving up after `max_attempts` consecutive failures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            cap: Duration::from_secs(8),
            max_attempts: 5,
        }
    }
}

impl Backoff {
    /// Delay before reconnect attempt `attempt` (zero based), or `None` once
    /// the attempts are exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.cap))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("subscribing to {pattern} failed: {reason}")]
    Subscribe { pattern: String, reason: String },
    #[error("update stream closed by the broker")]
    StreamEnded,
    #[error("websocket client went away")]
    ClientGone,
}

impl RelayError {
    /// Broker-side failures are worth reconnecting; a departed client is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RelayError::ClientGone)
    }
}

#[derive(Clone)]
pub struct UpdateSource {
    client: Client,
    pattern: String,
    pub backoff: Backoff,
}

impl UpdateSource {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            client,
            pattern: channel_key(namespace, "*"),
            backoff: Backoff::default(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub async fn subscribe(&self) -> Result<UpdateStream, RelayError> {
        let subscribe_error = |err: redis::RedisError| RelayError::Subscribe {
            pattern: self.pattern.clone(),
            reason: err.to_string(),
        };

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(subscribe_error)?;
        pubsub
            .psubscribe(&self.pattern)
            .await
            .map_err(subscribe_error)?;

        let messages = pubsub
            .into_on_message()
            .filter_map(|message| message.get_payload::<String>().ok());
        Ok(Box::pin(messages))
    }
}
