//! Error handling for the restaurant order and stock service
//!
//! Validation-class errors are returned to the caller verbatim. Everything
//! else is logged with a correlation id and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Authentication required")]
    Unauthorized,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Too many order submissions")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Stock deduction failed: {0}")]
    Deduction(String),

    #[error("Inventory count is stale: stock moved since it was submitted")]
    StaleCount,

    #[error("Inventory count was already applied")]
    AlreadyApplied,

    #[error("Courier is unavailable or at capacity")]
    CourierAtCapacity,

    #[error("Order already has a courier assigned")]
    CourierAlreadyAssigned,

    // Storage errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    // Internal errors
    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    /// Wrap any failure raised while posting a delivered order's deductions
    pub fn into_deduction(self) -> Self {
        match self {
            AppError::Deduction(_) => self,
            other => AppError::Deduction(other.to_string()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::TokenExpired | AppError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. }
            | AppError::StaleCount
            | AppError::AlreadyApplied
            | AppError::CourierAtCapacity
            | AppError::CourierAlreadyAssigned => StatusCode::CONFLICT,
            AppError::Deduction(_)
            | AppError::DatabaseError(_)
            | AppError::Storage(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::Deduction(_) => "DEDUCTION_FAILED",
            AppError::StaleCount => "STALE_COUNT",
            AppError::AlreadyApplied => "ALREADY_APPLIED",
            AppError::CourierAtCapacity => "COURIER_AT_CAPACITY",
            AppError::CourierAlreadyAssigned => "COURIER_ALREADY_ASSIGNED",
            AppError::DatabaseError(_) | AppError::Storage(_) => "STORAGE_ERROR",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Errors whose detail would leak internals to the caller
    pub fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Message safe to show the caller. Internal failures are logged here
    /// under a fresh correlation id, which is returned alongside.
    pub fn public_message(&self) -> (String, Option<Uuid>) {
        if self.is_internal() {
            let correlation_id = Uuid::new_v4();
            tracing::error!(%correlation_id, code = self.code(), error = ?self, "Request failed");
            let message = match self {
                AppError::Deduction(_) => "Could not update stock for this order; nothing was changed",
                _ => "An unexpected error occurred",
            };
            return (message.to_string(), Some(correlation_id));
        }
        (self.to_string(), None)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |e| match &e.message {
                    // Struct-level checks carry a complete sentence
                    Some(message) if field == "__all__" => message.to_string(),
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let (message, correlation_id) = self.public_message();
        if correlation_id.is_none() {
            tracing::debug!(code, "{}", message);
        }

        let errors = match self {
            AppError::Validation(errors) => errors,
            _ => Vec::new(),
        };

        let detail = ErrorDetail {
            code: code.to_string(),
            message,
            errors,
            correlation_id,
        };

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
