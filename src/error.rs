//! Error types for Bibliotheca server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric codes returned alongside every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NoSuchData = 5,
    OutOfStock = 7,
    Duplicate = 8,
    AlreadyReturned = 13,
    BadValue = 18,
    InvalidPeriod = 19,
    InvalidAdjustment = 20,
    BookInUse = 21,
    MemberInUse = 22,
    Timeout = 23,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid borrowing period: {0} days (allowed 1 to 60)")]
    InvalidPeriod(i64),

    #[error("Book {0} has no available copies")]
    OutOfStock(i32),

    #[error("Borrowing {0} has already been returned")]
    AlreadyReturned(i32),

    #[error("Invalid copies adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Book {0} has open borrowings")]
    BookInUse(i32),

    #[error("Member {0} has open borrowings")]
    MemberInUse(i32),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::InvalidPeriod(_) => (StatusCode::BAD_REQUEST, ErrorCode::InvalidPeriod),
            AppError::OutOfStock(_) => (StatusCode::CONFLICT, ErrorCode::OutOfStock),
            AppError::AlreadyReturned(_) => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::InvalidAdjustment(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::InvalidAdjustment)
            }
            AppError::BookInUse(_) => (StatusCode::CONFLICT, ErrorCode::BookInUse),
            AppError::MemberInUse(_) => (StatusCode::CONFLICT, ErrorCode::MemberInUse),
            AppError::Timeout(_) => (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::Timeout),
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
