//! Map [`GateError`] onto HTTP status codes and the JSON error body.

use axum::{
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::gate::{lockout::retry_after_minutes, GateError};

pub const INVALID_REQUEST_FORMAT: &str = "Invalid request format";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

impl GateError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Never carries internal details.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(message) => (*message).to_string(),
            Self::InvalidCredentials => "Invalid Agent ID or Access Key".to_string(),
            Self::RateLimited {
                retry_after_seconds,
            } => format!(
                "Too many login attempts. Please try again in {} minutes.",
                retry_after_minutes(*retry_after_seconds)
            ),
            Self::Unauthorized => "Authentication required".to_string(),
            Self::NotFound => "File not found".to_string(),
            Self::MethodNotSupported => "Method not allowed".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        match &self {
            Self::RateLimited {
                retry_after_seconds,
            } => {
                headers.insert(RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
            }
            Self::Internal(err) => error!("Internal error: {err:#}"),
            _ => {}
        }

        (
            self.status(),
            headers,
            Json(ErrorResponse::new(self.public_message())),
        )
            .into_response()
    }
}
