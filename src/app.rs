use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    routes::{cocktails, eighty_six, health, ocr, updates},
    state::AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/cocktails/search", get(cocktails::search_handler))
        .route(
            "/api/cocktails/calculate-cost",
            post(cocktails::calculate_cost_handler),
        )
        .route(
            "/api/cocktails/cost-summary",
            post(cocktails::cost_summary_handler),
        )
        .route("/api/86-list", get(eighty_six::list_handler))
        .route("/api/86-list/add", post(eighty_six::add_handler))
        .route("/api/ocr/menu", post(ocr::menu_handler))
        .route("/ws/updates", get(updates::updates_handler))
        .layer(cors(&state.config.allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(err) => {
            warn!("ALLOWED_ORIGIN {allowed_origin:?} is not a valid header value, CORS disabled: {err}");
            layer
        }
    }
}
