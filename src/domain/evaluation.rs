//! Pour-cost and margin evaluation.
//!
//! Everything here is synchronous and side-effect free: callers hydrate the
//! pricing and the cost table, decide what to do with `should_alert`, and own
//! any caching.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::entities::{CocktailPricing, Recipe};

/// Minimum acceptable gross margin before an alert is raised.
pub const DEFAULT_MARGIN_THRESHOLD: f64 = 70.0;

/// Status band above the target cost percent that still counts as a warning.
const WARNING_BAND: f64 = 1.1;

/// Resolves the cost of an ingredient per fluid ounce.
pub trait CostLookup {
    fn cost_per_unit(&self, ingredient: &str) -> Option<f64>;
}

/// In-memory cost table, usually loaded from the `ingredients` table for the
/// ingredients of a single recipe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CostTable {
    costs: HashMap<String, f64>,
    fallback: Option<f64>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ingredient: impl Into<String>, cost_per_unit: f64) {
        self.costs.insert(ingredient.into(), cost_per_unit);
    }

    /// Resolves unknown ingredients to `cost_per_unit` instead of failing.
    pub fn with_fallback(mut self, cost_per_unit: f64) -> Self {
        self.fallback = Some(cost_per_unit);
        self
    }

    /// Ingredients of `recipe` that have no recorded cost.
    pub fn missing(&self, recipe: &Recipe) -> Vec<String> {
        recipe
            .iter()
            .filter(|(name, _)| !self.costs.contains_key(name.as_str()))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl CostLookup for CostTable {
    fn cost_per_unit(&self, ingredient: &str) -> Option<f64> {
        self.costs.get(ingredient).copied().or(self.fallback)
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for CostTable {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self {
            costs: iter
                .into_iter()
                .map(|(name, cost)| (name.into(), cost))
                .collect(),
            fallback: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarginError {
    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),
    #[error("no cost recorded for ingredient {0}")]
    UnknownIngredient(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MarginResult {
    pub total_cost: f64,
    pub margin_percent: f64,
    pub profit: f64,
    /// Pour cost as a share of the menu price.
    pub cost_percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub result: MarginResult,
    pub should_alert: bool,
}

pub fn evaluate<L>(
    pricing: &CocktailPricing,
    costs: &L,
    threshold_percent: f64,
) -> Result<Evaluation, MarginError>
where
    L: CostLookup + ?Sized,
{
    let price = pricing.price;
    if !price.is_finite() || price <= 0.0 {
        return Err(MarginError::InvalidPrice(price));
    }

    let mut total_cost = 0.0;
    for (ingredient, ounces) in pricing.recipe.iter() {
        let cost = costs
            .cost_per_unit(ingredient)
            .ok_or_else(|| MarginError::UnknownIngredient(ingredient.clone()))?;
        total_cost += cost * ounces;
    }

    let profit = price - total_cost;
    let margin_percent = (profit / price) * 100.0;

    Ok(Evaluation {
        result: MarginResult {
            total_cost,
            margin_percent,
            profit,
            cost_percent: (total_cost / price) * 100.0,
        },
        should_alert: margin_percent < threshold_percent,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginStatus {
    Healthy,
    Warning,
    OverTarget,
}

impl MarginStatus {
    pub fn classify(cost_percent: f64, target_cost_percent: f64) -> Self {
        if cost_percent <= target_cost_percent {
            MarginStatus::Healthy
        } else if cost_percent <= target_cost_percent * WARNING_BAND {
            MarginStatus::Warning
        } else {
            MarginStatus::OverTarget
        }
    }
}

/// Target pour-cost percent implied by a minimum margin.
pub fn target_cost_percent(threshold_percent: f64) -> f64 {
    100.0 - threshold_percent
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MenuSummary {
    pub average_cost_percent: f64,
    pub over_target: usize,
    pub average_profit: f64,
}

pub fn summarize(evaluations: &[Evaluation], target_cost_percent: f64) -> MenuSummary {
    if evaluations.is_empty() {
        return MenuSummary::default();
    }

    let count = evaluations.len() as f64;
    let (cost_sum, profit_sum) = evaluations.iter().fold((0.0, 0.0), |(cost, profit), e| {
        (cost + e.result.cost_percent, profit + e.result.profit)
    });
    let over_target = evaluations
        .iter()
        .filter(|e| e.result.cost_percent > target_cost_percent)
        .count();

    MenuSummary {
        average_cost_percent: cost_sum / count,
        over_target,
        average_profit: profit_sum / count,
    }
}
