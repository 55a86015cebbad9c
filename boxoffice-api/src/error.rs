use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use boxoffice_core::LedgerError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InsufficientInventory {
        requested: i32,
        available: i32,
    },
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::InsufficientInventory { requested, available } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Not enough tickets available",
                    "available": available,
                    "requested": requested,
                }),
            ),
            AppError::ServiceUnavailable(msg) => {
                tracing::error!("Ledger unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    json!({ "error": "Ledger temporarily unavailable, please retry" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::EventNotFound(_) | LedgerError::ReservationNotFound(_) => {
                AppError::NotFoundError(err.to_string())
            }
            LedgerError::InsufficientInventory { requested, available } => {
                AppError::InsufficientInventory { requested, available }
            }
            LedgerError::AlreadyCancelled(_)
            | LedgerError::InvalidTransition { .. }
            | LedgerError::CapacityBelowSold { .. } => AppError::ConflictError(err.to_string()),
            LedgerError::Validation(msg) => AppError::ValidationError(msg),
            LedgerError::Storage(msg) => AppError::ServiceUnavailable(msg),
        }
    }
}
