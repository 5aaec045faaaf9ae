//! HTTP handlers.
//!
//! Each handler is a thin axum adapter around an `*_impl` function taking the
//! shared [`AppState`] directly, so the flows can be driven without a router.
//! Cache and broadcast calls made here are best-effort: failures are logged
//! and never change the response.

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    infra::{bounded, CollaboratorError},
    state::AppState,
};

pub mod cocktails;
pub mod eighty_six;
pub mod health;
pub mod ocr;
pub mod updates;

/// Runs a collaborator call under the configured timeout.
pub(crate) async fn call<T, F>(
    state: &AppState,
    collaborator: &'static str,
    fut: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    bounded(state.config.collaborator_timeout, collaborator, fut).await
}

/// Cached JSON value under `key`, or `None` on a miss, an unreachable cache
/// or an undecodable entry.
pub(crate) async fn cache_read<T: DeserializeOwned>(state: &AppState, key: &str) -> Option<T> {
    let bytes = match call(state, "cache", state.cache.get(key)).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(key, "cache miss");
            return None;
        }
        Err(err) => {
            warn!(key, "cache read failed, treating as miss: {err}");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => {
            debug!(key, "cache hit");
            Some(value)
        }
        Err(err) => {
            warn!(key, "discarding undecodable cache entry: {err}");
            None
        }
    }
}

pub(crate) async fn cache_write<T: Serialize>(state: &AppState, key: &str, value: &T) {
    let bytes = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(key, "cache value not serializable: {err}");
            return;
        }
    };

    let ttl_secs = state.config.search_cache_ttl.as_secs();
    if let Err(err) = call(
        state,
        "cache",
        state.cache.set_with_expiry(key, bytes, ttl_secs),
    )
    .await
    {
        warn!(key, "cache write failed: {err}");
    }
}

pub(crate) async fn cache_invalidate(state: &AppState, key: &str) {
    if let Err(err) = call(state, "cache", state.cache.delete(key)).await {
        warn!(key, "cache invalidation failed: {err}");
    }
}

/// Publishes `payload`, logging instead of failing when the broadcaster is
/// slow or unreachable.
pub(crate) async fn publish_best_effort<T: Serialize>(
    state: &AppState,
    channel: &str,
    event: &str,
    payload: &T,
) {
    let payload = match serde_json::to_value(payload) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(channel, event, "payload not serializable: {err}");
            return;
        }
    };

    if let Err(err) = call(
        state,
        "broadcaster",
        state.publisher.publish(channel, event, payload),
    )
    .await
    {
        warn!(channel, event, "broadcast dropped: {err}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::{
        config::Config,
        domain::{CocktailPricing, CocktailRecord, Recipe},
        infra::memory::{MemoryCache, MemoryStore, RecordingPublisher, StaticOcr},
        state::AppState,
    };

    pub struct Harness {
        pub state: Arc<AppState>,
        pub store: MemoryStore,
        pub cache: MemoryCache,
        pub publisher: RecordingPublisher,
    }

    pub fn config() -> Config {
        Config::from_lookup(
            |key: &str| (key == "DATABASE_URL").then(|| "postgres://memory".to_string()),
            |_: &str| None,
        )
        .unwrap()
    }

    pub fn harness() -> Harness {
        harness_with(config())
    }

    pub fn harness_with(config: Config) -> Harness {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let publisher = RecordingPublisher::new();
        let state = AppState::with_collaborators(
            config,
            Arc::new(store.clone()),
            Arc::new(cache.clone()),
            Arc::new(publisher.clone()),
            Some(Arc::new(StaticOcr::new(
                "COCKTAILS\nNegroni ....... $14\nGin & Tonic 12.00\n",
            ))),
        );
        Harness {
            state,
            store,
            cache,
            publisher,
        }
    }

    /// Seeds the gin & tonic at `price` with gin at 0.50/oz and tonic at 0.10/oz.
    pub async fn seed_gin_and_tonic(store: &MemoryStore, id: &str, price: f64) {
        store
            .put_cocktail(CocktailRecord {
                id: id.to_string(),
                pricing: CocktailPricing {
                    name: "Gin & Tonic".to_string(),
                    price,
                    recipe: Recipe::from([("gin", 2.0), ("tonic", 4.0)]),
                },
            })
            .await;
        store.put_cost("gin", 0.5).await;
        store.put_cost("tonic", 0.1).await;
    }
}
