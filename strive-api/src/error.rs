use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use strive_booking::EngineError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    /// Lock contention; the caller should retry with backoff.
    LockBusy(String),
    PaymentRequired(String),
    UnprocessableError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn internal<E: ToString>(err: E) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, retryable) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, false),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg, false),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg, false),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg, false),
            AppError::LockBusy(msg) => (StatusCode::CONFLICT, msg, true),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg, false),
            AppError::UnprocessableError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, false),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    false,
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    false,
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ClassNotFound(_) | EngineError::BookingNotFound(_) => {
                AppError::NotFoundError(err.to_string())
            }
            EngineError::LockUnavailable => AppError::LockBusy(err.to_string()),
            EngineError::InsufficientCredits { .. }
            | EngineError::WaitlistFull { .. }
            | EngineError::NoEligibleGrant(_) => AppError::UnprocessableError(err.to_string()),
            EngineError::PaymentDeclined { .. } => AppError::PaymentRequired(err.to_string()),
            EngineError::InvalidArgument(_) | EngineError::ClassNotStarted => {
                AppError::ValidationError(err.to_string())
            }
            EngineError::Lock(_) | EngineError::Gateway(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
