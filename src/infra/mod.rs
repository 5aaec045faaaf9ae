//! Collaborator seams and their adapters.
//!
//! Handlers only see the traits below; `AppState` decides which adapter backs
//! each one (Postgres, Redis and Google Vision in production, the in-memory
//! adapters in tests).

use std::{fmt::Display, future::Future, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;

use crate::domain::{CocktailRecord, CostTable, EightySixEntry, NewEightySixItem, SearchHit};

pub mod broadcast;
pub mod cache;
pub mod memory;
pub mod store;
pub mod vision;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {elapsed_ms} ms")]
    Timeout {
        collaborator: &'static str,
        elapsed_ms: u64,
    },
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[error("malformed record from {collaborator}: {reason}")]
    MalformedRecord {
        collaborator: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn unavailable<E: Display>(collaborator: &'static str) -> impl FnOnce(E) -> Self {
        move |err| CollaboratorError::Unavailable {
            collaborator,
            reason: err.to_string(),
        }
    }

    pub fn malformed<E: Display>(collaborator: &'static str) -> impl FnOnce(E) -> Self {
        move |err| CollaboratorError::MalformedRecord {
            collaborator,
            reason: err.to_string(),
        }
    }
}

/// Runs a collaborator call with an upper bound on its latency.
pub async fn bounded<T, F>(
    limit: Duration,
    collaborator: &'static str,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            collaborator,
            elapsed_ms: limit.as_millis() as u64,
        }),
    }
}

/// Relational store holding cocktails, ingredient costs and the 86 list.
#[async_trait]
pub trait CocktailStore: Send + Sync {
    async fn fetch_cocktail(&self, id: &str) -> Result<Option<CocktailRecord>, CollaboratorError>;

    /// Costs per ounce for the named ingredients. Names without a recorded
    /// cost are simply absent from the table.
    async fn ingredient_costs(&self, names: &[String]) -> Result<CostTable, CollaboratorError>;

    async fn search_cocktails(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchHit>, CollaboratorError>;

    async fn add_eighty_six(
        &self,
        item: &NewEightySixItem,
    ) -> Result<EightySixEntry, CollaboratorError>;

    async fn active_eighty_six(&self) -> Result<Vec<EightySixEntry>, CollaboratorError>;
}

/// Key-value cache with per-entry expiry.
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CollaboratorError>;

    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: u64,
    ) -> Result<(), CollaboratorError>;

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError>;
}

/// Fire-and-forget notification channel.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError>;
}

/// Text extraction from a menu photo.
#[async_trait]
pub trait MenuOcr: Send + Sync {
    async fn extract_text(&self, image_url: &str) -> Result<String, CollaboratorError>;
}
