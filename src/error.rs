use std::any::Any;

use axum::{
    Json,
    http::{StatusCode, uri::InvalidUri},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorEnvelope;

/// AppError
///
/// Every failure a request can raise once it has left the handler that produced it.
/// Converting it into a response is the Error Boundary: the failure is logged exactly once,
/// here, and the client receives the `{msg, details}` envelope. Nothing beyond the failure's
/// own message reaches the body.
#[derive(Debug, Error)]
pub enum AppError {
    /// The JSON body could not be parsed.
    #[error("{0}")]
    BodyDecode(String),

    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    #[error(transparent)]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Uri(#[from] InvalidUri),

    /// Raised by a delegated handler group with its own message.
    #[error("{0}")]
    Handler(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BodyDecode(_) => StatusCode::BAD_REQUEST,
            AppError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) | AppError::Io(_) | AppError::Uri(_) | AppError::Handler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = match &self {
            AppError::BodyDecode(_) => {
                tracing::warn!(error = %self, "rejected malformed request body");
                ErrorEnvelope::with_details("Malformed request body", self.to_string())
            }
            AppError::BodyTooLarge { .. } => {
                tracing::warn!(error = %self, "rejected oversized request body");
                ErrorEnvelope::with_details("Payload too large", self.to_string())
            }
            _ => {
                tracing::error!(error = ?self, "SERVER ERROR");
                ErrorEnvelope::with_details("Server error", self.to_string())
            }
        };
        (status, Json(envelope)).into_response()
    }
}

/// panic_response
///
/// Handler for `CatchPanicLayer`. A panic anywhere below the layer is treated exactly like an
/// unhandled `AppError`: logged with its payload and answered with the 500 envelope.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(panic = %details, "SERVER ERROR: handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorEnvelope::with_details("Server error", details)),
    )
        .into_response()
}
