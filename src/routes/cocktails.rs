use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{cache_read, cache_write, call, publish_best_effort};
use crate::{
    domain::{
        derive_key, evaluate, summarize, target_cost_percent, CocktailRecord, CostTable,
        Evaluation, MarginAlert, MarginResult, MarginStatus, MenuSummary, SearchHit,
        ALERT_CHANNEL, LOW_MARGIN_EVENT,
    },
    error::AppError,
    state::AppState,
    util::now_rfc3339,
};

pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;
const MAX_SUMMARY_ITEMS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    search_impl(&state, params).await.map(Json)
}

pub async fn search_impl(
    state: &AppState,
    params: SearchParams,
) -> Result<Vec<SearchHit>, AppError> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::MalformedPayload("q must not be empty".to_string()));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let key = derive_key(query, limit);
    if let Some(hits) = cache_read::<Vec<SearchHit>>(state, &key).await {
        return Ok(hits);
    }

    let hits = call(state, "store", state.store.search_cocktails(query, limit)).await?;
    cache_write(state, &key, &hits).await;
    Ok(hits)
}

#[derive(Debug, Default, Deserialize)]
pub struct CostParams {
    #[serde(default)]
    pub cocktail_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CostResponse {
    pub cocktail_id: String,
    pub cocktail: String,
    pub price: f64,
    pub cost: f64,
    pub profit: f64,
    pub margin_percent: f64,
    pub cost_percent: f64,
    pub status: MarginStatus,
    pub should_alert: bool,
}

impl CostResponse {
    fn new(record: &CocktailRecord, evaluation: &Evaluation, target_cost_percent: f64) -> Self {
        let MarginResult {
            total_cost,
            margin_percent,
            profit,
            cost_percent,
        } = evaluation.result;
        Self {
            cocktail_id: record.id.clone(),
            cocktail: record.pricing.name.clone(),
            price: record.pricing.price,
            cost: total_cost,
            profit,
            margin_percent,
            cost_percent,
            status: MarginStatus::classify(cost_percent, target_cost_percent),
            should_alert: evaluation.should_alert,
        }
    }
}

/// Accepts the id either as `?cocktail_id=` or as a JSON body.
pub async fn calculate_cost_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CostParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<CostResponse>, AppError> {
    let Query(params) = params.map_err(|e| AppError::MalformedPayload(e.body_text()))?;

    let cocktail_id = match params.cocktail_id {
        Some(id) => id,
        None if body.is_empty() => {
            return Err(AppError::MalformedPayload(
                "cocktail_id is required".to_string(),
            ))
        }
        None => serde_json::from_slice::<CostParams>(&body)
            .map_err(|e| AppError::MalformedPayload(e.to_string()))?
            .cocktail_id
            .ok_or_else(|| AppError::MalformedPayload("cocktail_id is required".to_string()))?,
    };

    calculate_cost_impl(&state, &cocktail_id).await.map(Json)
}

pub async fn calculate_cost_impl(
    state: &AppState,
    cocktail_id: &str,
) -> Result<CostResponse, AppError> {
    let (record, evaluation) = evaluate_cocktail(state, cocktail_id).await?;

    if let Some(alert) = MarginAlert::for_evaluation(&record.pricing, &evaluation, now_rfc3339()) {
        info!(
            cocktail = %alert.subject,
            margin_percent = alert.margin_percent,
            "margin below threshold, alerting"
        );
        publish_best_effort(state, ALERT_CHANNEL, LOW_MARGIN_EVENT, &alert).await;
    }

    Ok(CostResponse::new(
        &record,
        &evaluation,
        target_cost_percent(state.config.margin_threshold_percent),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub cocktail_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryItem {
    pub cocktail_id: String,
    pub name: String,
    pub result: MarginResult,
    pub status: MarginStatus,
}

impl SummaryItem {
    fn new(record: CocktailRecord, evaluation: &Evaluation, target_cost_percent: f64) -> Self {
        Self {
            cocktail_id: record.id,
            name: record.pricing.name,
            result: evaluation.result,
            status: MarginStatus::classify(evaluation.result.cost_percent, target_cost_percent),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryResponse {
    pub items: Vec<SummaryItem>,
    pub summary: MenuSummary,
}

pub async fn cost_summary_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    cost_summary_impl(&state, &request.cocktail_ids).await.map(Json)
}

/// Evaluates several cocktails at once for the pour-cost overview. Never
/// publishes alerts.
pub async fn cost_summary_impl(
    state: &AppState,
    cocktail_ids: &[String],
) -> Result<SummaryResponse, AppError> {
    if cocktail_ids.len() > MAX_SUMMARY_ITEMS {
        return Err(AppError::MalformedPayload(format!(
            "at most {MAX_SUMMARY_ITEMS} cocktails per summary"
        )));
    }

    let target = target_cost_percent(state.config.margin_threshold_percent);
    let mut items = Vec::with_capacity(cocktail_ids.len());
    let mut evaluations = Vec::with_capacity(cocktail_ids.len());
    for id in cocktail_ids {
        let (record, evaluation) = evaluate_cocktail(state, id).await?;
        items.push(SummaryItem::new(record, &evaluation, target));
        evaluations.push(evaluation);
    }

    Ok(SummaryResponse {
        summary: summarize(&evaluations, target),
        items,
    })
}

async fn evaluate_cocktail(
    state: &AppState,
    cocktail_id: &str,
) -> Result<(CocktailRecord, Evaluation), AppError> {
    let record = call(state, "store", state.store.fetch_cocktail(cocktail_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cocktail {cocktail_id}")))?;

    let costs = load_costs(state, &record).await?;
    let evaluation = evaluate(
        &record.pricing,
        &costs,
        state.config.margin_threshold_percent,
    )?;
    Ok((record, evaluation))
}

async fn load_costs(state: &AppState, record: &CocktailRecord) -> Result<CostTable, AppError> {
    let names = record.pricing.recipe.ingredient_names();
    let costs = call(state, "store", state.store.ingredient_costs(&names)).await?;

    let Some(fallback) = state.config.missing_cost_fallback else {
        return Ok(costs);
    };

    let missing = costs.missing(&record.pricing.recipe);
    if !missing.is_empty() {
        warn!(
            cocktail = %record.pricing.name,
            ?missing,
            fallback,
            "ingredients without a recorded cost, using fallback"
        );
    }
    Ok(costs.with_fallback(fallback))
}
