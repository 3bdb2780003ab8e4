/// API routes and handlers
pub mod admin;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod playlists;
pub mod quiz;
pub mod user;

use crate::{context::AppContext, error::AppError};
use axum::{
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Success envelope: `{success: true, message, data}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// Respond with a non-200 success status such as 201
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejection uses the error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/user", auth::routes().merge(user::routes()))
        .nest("/api/quiz", quiz::routes())
        .nest("/api/playlists", playlists::routes())
        .nest("/api/admin", admin::routes())
        .merge(health::routes())
}
