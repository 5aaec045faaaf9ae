//! # Postgres
//!
//! Source of truth for cocktails, ingredient costs and the 86 list.
//!
//! ## Tables
//! - `cocktails(id, name, price, ingredients)`: `ingredients` is a JSON object of
//!   ingredient name to ounces, or to `{ "quantity", "unit" }`
//! - `ingredients(name, cost_per_oz)`
//! - `cocktail_search(id, name, description, category, price, image_r2_key,
//!   ingredients_list, search_vector)`: full-text view over the menu
//! - `eighty_six_list(id, item_name, category, added_by, reason, created_at)`
//!
//! Numeric and id columns are cast in SQL so the adapter does not depend on
//! the exact column types chosen by the migration.
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    Row,
};

use super::{CocktailStore, CollaboratorError};
use crate::domain::{
    CocktailPricing, CocktailRecord, CostTable, EightySixEntry, NewEightySixItem, Recipe,
    SearchHit,
};

const COLLABORATOR: &str = "postgres";
const MAX_CONNECTIONS: u32 = 10;

const EIGHTY_SIX_COLUMNS: &str = r#"
    id::text AS id, item_name, category, added_by, reason,
    to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

pub async fn connect_postgres(url: &str, acquire_timeout: Duration) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, CollaboratorError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(CollaboratorError::malformed(COLLABORATOR))
}

fn eighty_six_from_row(row: &PgRow) -> Result<EightySixEntry, CollaboratorError> {
    Ok(EightySixEntry {
        id: column(row, "id")?,
        item_name: column(row, "item_name")?,
        category: column(row, "category")?,
        added_by: column(row, "added_by")?,
        reason: column(row, "reason")?,
        created_at: column(row, "created_at")?,
    })
}

#[async_trait]
impl CocktailStore for PgStore {
    async fn fetch_cocktail(&self, id: &str) -> Result<Option<CocktailRecord>, CollaboratorError> {
        let row = sqlx::query(
            "SELECT id::text AS id, name, price::float8 AS price, ingredients::text AS ingredients
             FROM cocktails WHERE id::text = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ingredients: String = column(&row, "ingredients")?;
        let recipe =
            Recipe::from_json(&ingredients).map_err(CollaboratorError::malformed(COLLABORATOR))?;

        Ok(Some(CocktailRecord {
            id: column(&row, "id")?,
            pricing: CocktailPricing {
                name: column(&row, "name")?,
                price: column(&row, "price")?,
                recipe,
            },
        }))
    }

    async fn ingredient_costs(&self, names: &[String]) -> Result<CostTable, CollaboratorError> {
        let rows = sqlx::query(
            "SELECT name, cost_per_oz::float8 AS cost_per_oz FROM ingredients WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        let mut table = CostTable::new();
        for row in &rows {
            let name: String = column(row, "name")?;
            let cost: f64 = column(row, "cost_per_oz")?;
            if !cost.is_finite() || cost < 0.0 {
                return Err(CollaboratorError::MalformedRecord {
                    collaborator: COLLABORATOR,
                    reason: format!("ingredient {name} has cost {cost}"),
                });
            }
            table.insert(name, cost);
        }
        Ok(table)
    }

    async fn search_cocktails(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        let rows = sqlx::query(
            "SELECT id::text AS id, name, description, category, price::float8 AS price,
                    image_r2_key, to_jsonb(ingredients_list)::text AS ingredients_list
             FROM cocktail_search
             WHERE search_vector @@ plainto_tsquery('english', $1)
             ORDER BY ts_rank(search_vector, plainto_tsquery('english', $1)) DESC
             LIMIT $2",
        )
        .bind(query)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        rows.iter()
            .map(|row| -> Result<SearchHit, CollaboratorError> {
                let ingredients: Option<String> = column(row, "ingredients_list")?;
                let ingredients_list = match ingredients {
                    Some(raw) => serde_json::from_str(&raw)
                        .map_err(CollaboratorError::malformed(COLLABORATOR))?,
                    None => serde_json::Value::Null,
                };

                Ok(SearchHit {
                    id: column(row, "id")?,
                    name: column(row, "name")?,
                    description: column(row, "description")?,
                    category: column(row, "category")?,
                    price: column(row, "price")?,
                    image_r2_key: column(row, "image_r2_key")?,
                    ingredients_list,
                })
            })
            .collect()
    }

    async fn add_eighty_six(
        &self,
        item: &NewEightySixItem,
    ) -> Result<EightySixEntry, CollaboratorError> {
        let sql = format!(
            "INSERT INTO eighty_six_list (item_name, category, added_by, reason)
             VALUES ($1, $2, $3, $4)
             RETURNING {EIGHTY_SIX_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&item.name)
            .bind(&item.category)
            .bind(&item.user_id)
            .bind(&item.reason)
            .fetch_one(&self.pool)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        eighty_six_from_row(&row)
    }

    async fn active_eighty_six(&self) -> Result<Vec<EightySixEntry>, CollaboratorError> {
        let sql = format!("SELECT {EIGHTY_SIX_COLUMNS} FROM eighty_six_list ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(CollaboratorError::unavailable(COLLABORATOR))?;

        rows.iter().map(eighty_six_from_row).collect()
    }
}
