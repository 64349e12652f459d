//! Interaction endpoint errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::commands::DispatchError;

#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    #[error("Missing or invalid gateway token")]
    Unauthorized,

    #[error("Invalid interaction: {0}")]
    InvalidPayload(String),

    #[error("Unsupported interaction type {0}")]
    UnsupportedType(u8),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl InteractionError {
    const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::UnsupportedType(_) => "unsupported_type",
            Self::Dispatch(_) => "internal_error",
        }
    }
}

impl IntoResponse for InteractionError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::InvalidPayload(_) | Self::UnsupportedType(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Dispatch(e) => {
                tracing::error!(error = %e, "Interaction dispatch failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({ "error": self.code(), "message": message })),
        )
            .into_response()
    }
}
