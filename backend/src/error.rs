//! Error handling for the stock ledger service
//!
//! Every error leaves the service as `{"success": false, "code", "message"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::fulfillment::FulfillmentError;
use shared::posting::PostingError;
use shared::stock::StockError;
use shared::{AlertError, StatusError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Authorization errors
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Warehouse access denied: {0}")]
    WarehouseScope(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("{0}")]
    AlreadyValidated(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions | AppError::WarehouseScope(_) => {
                StatusCode::FORBIDDEN
            }
            AppError::Validation { .. }
            | AppError::ValidationErrors(_)
            | AppError::AlreadyValidated(_)
            | AppError::InvalidState(_)
            | AppError::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AppError::WarehouseScope(_) => "WAREHOUSE_SCOPE",
            AppError::Validation { .. } | AppError::ValidationErrors(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyValidated(_) => "ALREADY_VALIDATED",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Message shown to clients; server faults stay generic
    fn public_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Invalid email or password".to_string(),
            AppError::TokenExpired => "Token has expired".to_string(),
            AppError::InvalidToken => "Invalid token".to_string(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::InsufficientPermissions => {
                "You do not have permission to perform this action".to_string()
            }
            AppError::WarehouseScope(msg) => msg.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::ValidationErrors(errors) => first_validation_error(errors)
                .map(|(_, msg)| msg)
                .unwrap_or_else(|| "Invalid input".to_string()),
            AppError::Conflict(msg) => msg.clone(),
            AppError::NotFound(resource) => format!("{} not found", resource),
            AppError::AlreadyValidated(msg)
            | AppError::InvalidState(msg)
            | AppError::InsufficientStock(msg) => msg.clone(),
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalError(_) => {
                "An internal server error occurred".to_string()
            }
        }
    }

    fn field(&self) -> Option<String> {
        match self {
            AppError::Validation { field, .. } => Some(field.clone()),
            AppError::ValidationErrors(errors) => {
                first_validation_error(errors).map(|(field, _)| field)
            }
            _ => None,
        }
    }
}

/// Pick the first failing field in name order so responses are stable
fn first_validation_error(errors: &validator::ValidationErrors) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);
    fields.into_iter().find_map(|(name, list)| {
        list.first().map(|e| {
            let message = e
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", name));
            (name.to_string(), message)
        })
    })
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique constraint");
                return AppError::Conflict(format!("Duplicate value violates {}", constraint));
            }
        }
        AppError::Database(err)
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::AlreadyValidated(_) => AppError::AlreadyValidated(err.to_string()),
            StatusError::Canceled(_) | StatusError::NotAllowed { .. } => {
                AppError::InvalidState(err.to_string())
            }
        }
    }
}

impl From<PostingError> for AppError {
    fn from(err: PostingError) -> Self {
        match err {
            PostingError::InsufficientStock { .. } => AppError::InsufficientStock(err.to_string()),
            PostingError::UnknownProduct(id) => AppError::NotFound(format!("Product {}", id)),
            PostingError::EmptyDocument => AppError::validation("items", err.to_string()),
            PostingError::NonPositiveQuantity { .. } => {
                AppError::validation("quantity", err.to_string())
            }
            PostingError::NegativeCount(_) => {
                AppError::validation("counted_quantity", err.to_string())
            }
            PostingError::SameLocation => {
                AppError::validation("destination_location_id", err.to_string())
            }
            PostingError::Stock { .. } => AppError::InvalidState(err.to_string()),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::InsufficientStock { .. } => AppError::InsufficientStock(err.to_string()),
            StockError::UnknownProduct(id) => AppError::NotFound(format!("Product {}", id)),
            StockError::NegativeQuantity(_) | StockError::Overflow => {
                AppError::InvalidState(err.to_string())
            }
        }
    }
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::UnknownItem(id) => AppError::NotFound(format!("Delivery item {}", id)),
            FulfillmentError::NegativeQuantity { .. } | FulfillmentError::ExceedsLimit { .. } => {
                AppError::validation("quantity", err.to_string())
            }
        }
    }
}

impl From<AlertError> for AppError {
    fn from(err: AlertError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Password hashing failed: {}", err))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = self.code(), "Request rejected: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            code: self.code().to_string(),
            message: self.public_message(),
            field: self.field(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
