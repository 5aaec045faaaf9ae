use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use super::call;
use crate::{
    domain::{parse_menu_text, MenuItem},
    error::AppError,
    infra::CollaboratorError,
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct OcrParams {
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OcrResponse {
    pub raw_text: String,
    pub parsed_items: Vec<MenuItem>,
}

/// Accepts the image either as `?image_url=` or as a JSON body.
pub async fn menu_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<OcrParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<OcrResponse>, AppError> {
    let Query(params) = params.map_err(|e| AppError::MalformedPayload(e.body_text()))?;

    let image_url = match params.image_url {
        Some(url) => Some(url),
        None if body.is_empty() => None,
        None => serde_json::from_slice::<OcrParams>(&body)
            .map_err(|e| AppError::MalformedPayload(e.to_string()))?
            .image_url,
    }
    .ok_or_else(|| AppError::MalformedPayload("image_url is required".to_string()))?;

    menu_impl(&state, &image_url).await.map(Json)
}

pub async fn menu_impl(state: &AppState, image_url: &str) -> Result<OcrResponse, AppError> {
    let parsed = Url::parse(image_url)
        .map_err(|e| AppError::MalformedPayload(format!("image_url: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::MalformedPayload(
            "image_url must be http or https".to_string(),
        ));
    }

    let Some(ocr) = &state.ocr else {
        return Err(CollaboratorError::Unavailable {
            collaborator: "google-vision",
            reason: "GOOGLE_API_KEY not configured".to_string(),
        }
        .into());
    };

    let raw_text = call(state, "ocr", ocr.extract_text(parsed.as_str())).await?;
    let parsed_items = parse_menu_text(&raw_text);
    info!(
        lines = raw_text.lines().count(),
        items = parsed_items.len(),
        "menu transcribed"
    );

    Ok(OcrResponse {
        raw_text,
        parsed_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{config, harness};

    #[tokio::test]
    async fn transcription_is_parsed_into_items() {
        let h = harness();
        let response = menu_impl(&h.state, "https://images.example/menu.jpg")
            .await
            .unwrap();

        assert!(response.raw_text.starts_with("COCKTAILS"));
        assert_eq!(response.parsed_items.len(), 2);
        assert_eq!(response.parsed_items[0].name, "Negroni");
        assert_eq!(response.parsed_items[0].price, 14.0);
        assert_eq!(
            response.parsed_items[1].section.as_deref(),
            Some("COCKTAILS")
        );
    }

    #[tokio::test]
    async fn bad_urls_are_rejected() {
        let h = harness();
        for url in ["not a url", "file:///etc/passwd"] {
            assert!(matches!(
                menu_impl(&h.state, url).await,
                Err(AppError::MalformedPayload(_))
            ));
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_unavailable() {
        let h = harness();
        let state = AppState::with_collaborators(
            config(),
            h.state.store.clone(),
            h.state.cache.clone(),
            h.state.publisher.clone(),
            None,
        );

        let err = menu_impl(&state, "https://images.example/menu.jpg")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "collaborator_unavailable");
    }
}
