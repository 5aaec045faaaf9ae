//! In-process adapters for every collaborator seam, used by the test suites.
//! The cache and publisher can be switched offline to exercise the error
//! paths of the handlers.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{AlertPublisher, CocktailStore, CollaboratorError, MenuOcr, SearchCache};
use crate::domain::{CocktailRecord, CostTable, EightySixEntry, NewEightySixItem, SearchHit};

fn offline(collaborator: &'static str) -> CollaboratorError {
    CollaboratorError::Unavailable {
        collaborator,
        reason: "offline".to_string(),
    }
}

#[derive(Default)]
struct StoreData {
    cocktails: HashMap<String, CocktailRecord>,
    costs: HashMap<String, f64>,
    eighty_six: Vec<EightySixEntry>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<StoreData>>,
    searches: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_cocktail(&self, record: CocktailRecord) {
        self.data
            .lock()
            .await
            .cocktails
            .insert(record.id.clone(), record);
    }

    pub async fn put_cost(&self, ingredient: &str, cost_per_unit: f64) {
        self.data
            .lock()
            .await
            .costs
            .insert(ingredient.to_string(), cost_per_unit);
    }

    /// Number of searches that reached the store (cache misses).
    pub fn search_count(&self) -> u64 {
        self.searches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CocktailStore for MemoryStore {
    async fn fetch_cocktail(&self, id: &str) -> Result<Option<CocktailRecord>, CollaboratorError> {
        Ok(self.data.lock().await.cocktails.get(id).cloned())
    }

    async fn ingredient_costs(&self, names: &[String]) -> Result<CostTable, CollaboratorError> {
        let data = self.data.lock().await;
        Ok(names
            .iter()
            .filter_map(|name| data.costs.get(name).map(|cost| (name.clone(), *cost)))
            .collect())
    }

    async fn search_cocktails(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        let needle = query.to_lowercase();
        let data = self.data.lock().await;

        let mut hits: Vec<SearchHit> = data
            .cocktails
            .values()
            .filter(|record| record.pricing.name.to_lowercase().contains(&needle))
            .map(|record| SearchHit {
                id: record.id.clone(),
                name: record.pricing.name.clone(),
                description: None,
                category: Some("cocktail".to_string()),
                price: Some(record.pricing.price),
                image_r2_key: None,
                ingredients_list: serde_json::json!(record.pricing.recipe.ingredient_names()),
            })
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn add_eighty_six(
        &self,
        item: &NewEightySixItem,
    ) -> Result<EightySixEntry, CollaboratorError> {
        let mut data = self.data.lock().await;
        let entry = EightySixEntry {
            id: (data.eighty_six.len() + 1).to_string(),
            item_name: item.name.clone(),
            category: item.category.clone(),
            added_by: item.user_id.clone(),
            reason: item.reason.clone(),
            created_at: None,
        };
        data.eighty_six.push(entry.clone());
        Ok(entry)
    }

    async fn active_eighty_six(&self) -> Result<Vec<EightySixEntry>, CollaboratorError> {
        Ok(self.data.lock().await.eighty_six.clone())
    }
}

struct Cached {
    value: Vec<u8>,
    stored_at: SystemTime,
    ttl: Duration,
}

impl Cached {
    fn if_fresh(&self) -> Option<Vec<u8>> {
        self.stored_at
            .elapsed()
            .map(|elapsed| elapsed <= self.ttl)
            .unwrap_or(false)
            .then(|| self.value.clone())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Cached>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the cache were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    fn check(&self) -> Result<(), CollaboratorError> {
        if self.offline.load(Ordering::Relaxed) {
            Err(offline("memory-cache"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        self.check()?;
        Ok(self.entries.lock().await.get(key).and_then(Cached::if_fresh))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: u64,
    ) -> Result<(), CollaboratorError> {
        self.check()?;
        self.entries.lock().await.insert(
            key.to_string(),
            Cached {
                value,
                stored_at: SystemTime::now(),
                ttl: Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CollaboratorError> {
        self.check()?;
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Published {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

/// Publisher that records every message it is handed.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<Published>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub async fn published(&self) -> Vec<Published> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl AlertPublisher for RecordingPublisher {
    async fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(offline("memory-broadcaster"));
        }
        self.published.lock().await.push(Published {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

/// OCR adapter returning a fixed transcription.
#[derive(Clone)]
pub struct StaticOcr {
    text: String,
}

impl StaticOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl MenuOcr for StaticOcr {
    async fn extract_text(&self, _image_url: &str) -> Result<String, CollaboratorError> {
        Ok(self.text.clone())
    }
}
