//! Redis-backed search cache.
//!
//! Values are opaque bytes (serialized JSON) stored with `SETEX`, so expiry is
//! enforced by Redis rather than by this process.

use std::time::Duration;

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use tracing::debug;

use super::{CollaboratorError, SearchCache};

const COLLABORATOR: &str = "redis";

pub async fn connect_redis(
    client: &Client,
    connect_timeout: Duration,
) -> Result<ConnectionManager, redis::RedisError> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(connect_timeout);

    client.get_connection_manager_with_config(config).await
}

#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SearchCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = connection
            .get(key)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        debug!(key, hit = value.is_some(), "cache lookup");
        Ok(value)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: u64,
    ) -> Result<(), CollaboratorError> {
        let mut connection = self.connection.clone();
        connection
            .set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))
    }

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError> {
        let mut connection = self.connection.clone();
        connection
            .del::<_, ()>(key)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_redis_fails_fast() {
        // nothing listens on port 1
        let client = Client::open("redis://127.0.0.1:1/").unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            connect_redis(&client, Duration::from_millis(200)),
        )
        .await
        .expect("connect_redis ignored its timeout");
        assert!(result.is_err());
    }
}
