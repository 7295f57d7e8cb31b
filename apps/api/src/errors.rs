use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::bots::store::StoreError;

/// Application-level error type for the dashboard JSON API.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// The OAuth callback answers in plain text and has its own error type
/// (`oauth::handlers::CallbackError`).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid license key")]
    InvalidLicense(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Subscription expired")]
    SubscriptionExpired,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidLicense(msg) => {
                tracing::warn!("License activation rejected");
                (StatusCode::FORBIDDEN, "INVALID_LICENSE", msg.clone())
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::SubscriptionExpired => (
                StatusCode::FORBIDDEN,
                "SUBSCRIPTION_EXPIRED",
                "The subscription has expired".to_string(),
            ),
            AppError::Store(StoreError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Bot {id} not found"),
            ),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
