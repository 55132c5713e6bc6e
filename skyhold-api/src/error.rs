use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skyhold_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let msg = err.to_string();
        match err {
            CoreError::ValidationError(_) | CoreError::SeatClassUnavailable { .. } => {
                AppError::ValidationError(msg)
            }
            CoreError::UserNotFound(_)
            | CoreError::FlightNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::UnknownTransaction(_) => AppError::NotFoundError(msg),
            CoreError::InsufficientInventory { .. }
            | CoreError::AlreadyCancelled(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::AlreadyPaid(_)
            | CoreError::DuplicateCode => AppError::ConflictError(msg),
            CoreError::BookingExpired(_) => AppError::GoneError(msg),
            CoreError::Unauthorized => AppError::AuthenticationError(msg),
            CoreError::GatewayError(_) | CoreError::StorageError(_) | CoreError::InternalError(_) => {
                AppError::InternalServerError(msg)
            }
        }
    }
}
