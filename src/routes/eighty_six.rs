use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use super::{cache_invalidate, cache_read, cache_write, call, publish_best_effort};
use crate::{
    domain::{EightySixEntry, NewEightySixItem, EIGHTY_SIX_ACTIVE_KEY},
    error::AppError,
    state::AppState,
    util::now_rfc3339,
};

pub const EIGHTY_SIX_CHANNEL: &str = "86-list";
pub const ITEM_ADDED_EVENT: &str = "item-added";

#[derive(Debug, Serialize)]
struct ItemAdded<'a> {
    item: &'a EightySixEntry,
    timestamp: String,
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EightySixEntry>>, AppError> {
    list_impl(&state).await.map(Json)
}

pub async fn list_impl(state: &AppState) -> Result<Vec<EightySixEntry>, AppError> {
    if let Some(entries) = cache_read::<Vec<EightySixEntry>>(state, EIGHTY_SIX_ACTIVE_KEY).await {
        return Ok(entries);
    }

    let entries = call(state, "store", state.store.active_eighty_six()).await?;
    cache_write(state, EIGHTY_SIX_ACTIVE_KEY, &entries).await;
    Ok(entries)
}

pub async fn add_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewEightySixItem>, JsonRejection>,
) -> Result<Json<EightySixEntry>, AppError> {
    let Json(item) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    add_impl(&state, item).await.map(Json)
}

pub async fn add_impl(state: &AppState, item: NewEightySixItem) -> Result<EightySixEntry, AppError> {
    if item.name.trim().is_empty() {
        return Err(AppError::MalformedPayload("name must not be empty".to_string()));
    }

    let entry = call(state, "store", state.store.add_eighty_six(&item)).await?;
    info!(item = %entry.item_name, added_by = %entry.added_by, "86'd");

    let event = ItemAdded {
        item: &entry,
        timestamp: now_rfc3339(),
    };
    publish_best_effort(state, EIGHTY_SIX_CHANNEL, ITEM_ADDED_EVENT, &event).await;
    cache_invalidate(state, EIGHTY_SIX_ACTIVE_KEY).await;

    Ok(entry)
}
