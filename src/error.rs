/// Unified error types for the Soundtrack server
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// No matching account, quiz or playlist
    #[error("{0}")]
    NotFound(String),

    /// Wrong password
    #[error("{0}")]
    InvalidCredential(String),

    /// Supplied OTP does not match the issued one
    #[error("Invalid OTP")]
    InvalidOtp,

    /// Issued OTP is past its expiry
    #[error("OTP expired")]
    OtpExpired,

    /// Duplicate registration
    #[error("{0}")]
    Conflict(String),

    /// Missing or invalid bearer token
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// External playlist generator returned a non-success response
    #[error("Playlist generation failed: {0}")]
    GenerationFailed(String),

    /// Checkout provider errors
    #[error("Payment provider error: {0}")]
    Payment(String),

    /// A required secret or endpoint is not configured
    #[error("{0}")]
    Misconfigured(String),

    /// Email delivery errors
    #[error("Email error: {0}")]
    Mail(String),

    /// JWT encoding errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// HTTP status the error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidOtp | AppError::OtpExpired => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredential(_) | AppError::Authentication(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::GenerationFailed(_) | AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::Misconfigured(_)
            | AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Mail(_)
            | AppError::Jwt(_)
            | AppError::Internal(_)
            | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::Database(_)
            | AppError::Migration(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Jwt(_) => {
                tracing::error!("Request failed: {}", self);
                "Internal server error".to_string() // Don't leak details
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type AppResult<T> = Result<T, AppError>;
