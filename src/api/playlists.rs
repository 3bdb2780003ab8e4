/// Playlist retrieval and upgrade endpoints
use crate::{
    api::{ApiJson, ApiResponse},
    auth::AuthContext,
    context::AppContext,
    error::{AppError, AppResult},
    playlist::Playlist,
    quiz::{QuizOutcome, UpgradePlaylistRequest},
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};

/// Build playlist routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/guest/:quiz_id", get(get_guest_playlist))
        .route("/me", get(get_my_playlists))
        .route("/upgrade", post(upgrade_playlist))
}

/// Public lookup by quiz id, used by emailed links
async fn get_guest_playlist(
    State(ctx): State<AppContext>,
    Path(quiz_id): Path<String>,
) -> AppResult<ApiResponse<Playlist>> {
    let playlist = ctx.playlist_store.get_by_quiz(&quiz_id).await?;

    Ok(ApiResponse::ok("Guest playlist fetched successfully", playlist))
}

async fn get_my_playlists(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> AppResult<ApiResponse<Vec<Playlist>>> {
    let playlists = ctx.playlist_store.list_for_account(&auth.account.id).await?;

    Ok(ApiResponse::ok("User playlist fetched successfully", playlists))
}

/// Swap a free playlist for a paid quiz and return the checkout link
async fn upgrade_playlist(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<UpgradePlaylistRequest>,
) -> AppResult<ApiResponse<QuizOutcome>> {
    let missing = || AppError::Validation("Quiz ID and playlist ID are required".to_string());
    let quiz_id = req.quiz_id.as_deref().filter(|s| !s.is_empty()).ok_or_else(missing)?;
    let playlist_id = req
        .playlist_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;

    let outcome = ctx
        .quiz_service
        .upgrade_playlist(quiz_id, playlist_id, &auth.account.id)
        .await?;

    Ok(ApiResponse::ok("Checkout session created successfully", outcome))
}
