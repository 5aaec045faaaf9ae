//! Keys for memoized lookups in the shared cache.

const SEARCH_PREFIX: &str = "cocktail_search";

/// Cache key of the active 86 list; deleted whenever the list changes.
pub const EIGHTY_SIX_ACTIVE_KEY: &str = "86_list:active";

/// Key for a memoized cocktail search.
///
/// The query is length-prefixed (in bytes) so a `:` inside the query can never
/// shift the boundary between query and limit.
pub fn derive_key(query: &str, limit: u32) -> String {
    format!("{SEARCH_PREFIX}:{}:{query}:{limit}", query.len())
}
