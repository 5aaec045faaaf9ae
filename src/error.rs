use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    config::ConfigError,
    domain::MarginError,
    infra::{vision::VisionClientError, CollaboratorError},
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Margin(#[from] MarginError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl AppError {
    /// Machine-readable kind reported in the `error` field of the response.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MalformedPayload(_) => "malformed_payload",
            AppError::NotFound(_) => "not_found",
            AppError::Margin(MarginError::InvalidPrice(_)) => "invalid_price",
            AppError::Margin(MarginError::UnknownIngredient(_)) => "unknown_ingredient",
            AppError::Collaborator(CollaboratorError::MalformedRecord { .. }) => "malformed_record",
            AppError::Collaborator(_) => "collaborator_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Margin(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Collaborator(CollaboratorError::MalformedRecord { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Collaborator(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), "{self}");
        } else {
            warn!(kind = self.kind(), "{self}");
        }

        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Failures that stop the gateway from coming up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("postgres: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("vision client: {0}")]
    Vision(#[from] VisionClientError),

    #[error("binding {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Serve(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_kind(err: AppError) -> (StatusCode, &'static str) {
        (err.status(), err.kind())
    }

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            status_and_kind(MarginError::InvalidPrice(0.0).into()),
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_price")
        );
        assert_eq!(
            status_and_kind(MarginError::UnknownIngredient("yuzu".into()).into()),
            (StatusCode::UNPROCESSABLE_ENTITY, "unknown_ingredient")
        );
        assert_eq!(
            status_and_kind(
                CollaboratorError::Timeout {
                    collaborator: "postgres",
                    elapsed_ms: 2000
                }
                .into()
            ),
            (StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable")
        );
        assert_eq!(
            status_and_kind(
                CollaboratorError::MalformedRecord {
                    collaborator: "postgres",
                    reason: "bad json".into()
                }
                .into()
            ),
            (StatusCode::BAD_GATEWAY, "malformed_record")
        );
        assert_eq!(
            status_and_kind(AppError::NotFound("cocktail 9".into())),
            (StatusCode::NOT_FOUND, "not_found")
        );
        assert_eq!(
            status_and_kind(AppError::MalformedPayload("q is empty".into())),
            (StatusCode::BAD_REQUEST, "malformed_payload")
        );
    }

    #[test]
    fn message_is_the_display_of_the_cause() {
        let err = AppError::from(MarginError::UnknownIngredient("yuzu".into()));
        assert_eq!(err.to_string(), "no cost recorded for ingredient yuzu");
    }
}
