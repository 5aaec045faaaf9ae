use axum::Json;
use serde::Serialize;

use crate::util::{
    now_rfc3339,
    version::{version_label, APP_NAME},
};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: String,
    pub timestamp: String,
}

pub async fn health_handler() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: APP_NAME,
        version: version_label(),
        timestamp: now_rfc3339(),
    })
}
