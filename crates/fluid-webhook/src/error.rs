//! Webhook transport errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The admission review request was invalid or malformed
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// TLS material could not be loaded
    #[error("TLS config error: {0}")]
    Tls(String),

    /// The listener failed
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_) => StatusCode::BAD_REQUEST,
            WebhookError::Tls(_) | WebhookError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}
