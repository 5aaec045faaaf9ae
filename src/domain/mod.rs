//! Pricing, search-key and menu logic. Nothing in here performs I/O.

pub mod alert;
pub mod cache_key;
pub mod entities;
pub mod evaluation;
pub mod menu;

pub use alert::{MarginAlert, ALERT_CHANNEL, LOW_MARGIN_EVENT};
pub use cache_key::{derive_key, EIGHTY_SIX_ACTIVE_KEY};
pub use entities::{
    CocktailPricing, CocktailRecord, EightySixEntry, Measure, MenuItem, NewEightySixItem, Recipe,
    RecipeError, SearchHit, Unit,
};
pub use evaluation::{
    evaluate, summarize, target_cost_percent, CostLookup, CostTable, Evaluation, MarginError,
    MarginResult, MarginStatus, MenuSummary, DEFAULT_MARGIN_THRESHOLD,
};
pub use menu::parse_menu_text;
