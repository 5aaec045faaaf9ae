use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Millilitres to fluid ounces.
const OUNCES_PER_ML: f64 = 0.033814;
/// A dash is a fixed 1/32 oz regardless of the recorded quantity.
const DASH_OUNCES: f64 = 0.03125;
const SPLASH_OUNCES: f64 = 0.25;

/// Unit a recipe quantity was recorded in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Oz,
    Ml,
    Dash,
    Splash,
    /// Garnishes; counted but carry no pour volume.
    Piece,
}

/// A persisted recipe quantity: either a bare number of ounces or an explicit
/// `{ "quantity": .., "unit": .. }` pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Ounces(f64),
    Unit { quantity: f64, unit: Unit },
}

impl Measure {
    pub fn to_ounces(&self) -> f64 {
        match *self {
            Measure::Ounces(quantity) => quantity,
            Measure::Unit { quantity, unit } => match unit {
                Unit::Oz => quantity,
                Unit::Ml => quantity * OUNCES_PER_ML,
                Unit::Dash => DASH_OUNCES,
                Unit::Splash => SPLASH_OUNCES,
                Unit::Piece => 0.0,
            },
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RecipeError {
    #[error("ingredient list is not valid JSON: {0}")]
    Json(String),
    #[error("invalid quantity {quantity} for ingredient {ingredient}")]
    InvalidQuantity { ingredient: String, quantity: f64 },
}

/// Ingredient name to pour volume in fluid ounces.
///
/// Backed by a `BTreeMap` so cost accumulation always runs in the same order
/// and repeated evaluations are bit-identical.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recipe {
    pours: BTreeMap<String, f64>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a recipe from recorded measures. Zero-volume entries (garnish
    /// pieces) are dropped since they carry no pour cost.
    pub fn from_measures<I>(measures: I) -> Result<Self, RecipeError>
    where
        I: IntoIterator<Item = (String, Measure)>,
    {
        let mut pours = BTreeMap::new();
        for (ingredient, measure) in measures {
            let ounces = measure.to_ounces();
            if !ounces.is_finite() || ounces < 0.0 {
                return Err(RecipeError::InvalidQuantity {
                    ingredient,
                    quantity: ounces,
                });
            }
            if ounces > 0.0 {
                pours.insert(ingredient, ounces);
            }
        }
        Ok(Self { pours })
    }

    /// Parses the JSON object stored in the `cocktails.ingredients` column.
    pub fn from_json(raw: &str) -> Result<Self, RecipeError> {
        let measures: BTreeMap<String, Measure> =
            serde_json::from_str(raw).map_err(|err| RecipeError::Json(err.to_string()))?;
        Self::from_measures(measures)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.pours.iter()
    }

    pub fn ingredient_names(&self) -> Vec<String> {
        self.pours.keys().cloned().collect()
    }
}

impl<S: Into<String>, const N: usize> From<[(S, f64); N]> for Recipe {
    fn from(pours: [(S, f64); N]) -> Self {
        Self {
            pours: pours
                .into_iter()
                .map(|(name, ounces)| (name.into(), ounces))
                .collect(),
        }
    }
}

/// A cocktail as priced on the menu, hydrated by the caller from storage.
#[derive(Clone, Debug, PartialEq)]
pub struct CocktailPricing {
    pub name: String,
    pub price: f64,
    pub recipe: Recipe,
}

/// Row of the `cocktails` table.
#[derive(Clone, Debug, PartialEq)]
pub struct CocktailRecord {
    pub id: String,
    pub pricing: CocktailPricing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image_r2_key: Option<String>,
    #[serde(default)]
    pub ingredients_list: serde_json::Value,
}

/// Request body for adding an item to the 86 list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEightySixItem {
    pub name: String,
    pub category: String,
    pub user_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// An item currently unavailable ("86'd").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EightySixEntry {
    pub id: String,
    pub item_name: String,
    pub category: String,
    pub added_by: String,
    pub reason: Option<String>,
    pub created_at: Option<String>,
}

/// A priced line recognised in OCR'd menu text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub section: Option<String>,
    pub name: String,
    pub price: f64,
}
