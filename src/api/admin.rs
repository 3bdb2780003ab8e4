/// Admin API endpoints
///
/// Credential routes are pinned to the admin role; everything else requires
/// an `AdminAuthContext`.
use crate::{
    account::{
        AccountView, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
        ResetPasswordRequest, Role, RoleScope, UpdateProfileRequest, VerifyOtpRequest,
    },
    admin::{Dashboard, Pagination},
    api::{auth, user, ApiJson, ApiResponse},
    auth::AdminAuthContext,
    context::AppContext,
    error::AppResult,
    playlist::Playlist,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

const ADMIN_SCOPE: RoleScope = RoleScope::Only(Role::Admin);

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        // Credentials
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-otp", post(verify_otp))
        .route("/reset-password", post(reset_password))
        // Panel
        .route("/dashboard", get(get_dashboard))
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/playlists", get(list_playlists))
        .route("/playlists/:id", delete(delete_playlist))
        // Own profile
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
}

/// One page of an admin listing
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

async fn login(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    auth::login_in_scope(&ctx, req, ADMIN_SCOPE).await
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    auth::forgot_password_in_scope(&ctx, req, ADMIN_SCOPE).await
}

async fn verify_otp(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> AppResult<ApiResponse<Value>> {
    auth::verify_otp_in_scope(&ctx, req, ADMIN_SCOPE).await
}

async fn reset_password(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    auth::reset_password_in_scope(&ctx, req, ADMIN_SCOPE).await
}

async fn get_dashboard(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> AppResult<ApiResponse<Dashboard>> {
    let dashboard = ctx.dashboard.get_dashboard().await?;

    Ok(ApiResponse::ok("Dashboard fetched successfully", dashboard))
}

/// Non-admin accounts, newest first
async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Page<AccountView>>> {
    let (limit, offset) = page.resolve();

    let (accounts, total) = tokio::try_join!(
        ctx.account_manager.list_accounts(limit, offset),
        ctx.account_manager.count_accounts(),
    )?;

    Ok(ApiResponse::ok(
        "Users fetched successfully",
        Page {
            items: accounts.iter().map(|a| a.view()).collect(),
            total,
            limit,
            offset,
        },
    ))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.account_manager.delete_account(&id).await?;

    tracing::info!("Admin {} deleted account {}", admin.account.id, id);

    Ok(ApiResponse::ok("User deleted successfully", json!({})))
}

async fn list_playlists(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(page): Query<Pagination>,
) -> AppResult<ApiResponse<Page<Playlist>>> {
    let (limit, offset) = page.resolve();

    let (items, total) = tokio::try_join!(
        ctx.playlist_store.list(limit, offset),
        ctx.playlist_store.count(),
    )?;

    Ok(ApiResponse::ok(
        "Playlists fetched successfully",
        Page {
            items,
            total,
            limit,
            offset,
        },
    ))
}

async fn delete_playlist(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Value>> {
    ctx.playlist_store.delete(&id).await?;

    tracing::info!("Admin {} deleted playlist {}", admin.account.id, id);

    Ok(ApiResponse::ok("Playlist deleted successfully", json!({})))
}

async fn get_profile(admin: AdminAuthContext) -> AppResult<ApiResponse<Value>> {
    Ok(user::profile_response(
        "Profile fetched successfully",
        &admin.account,
    ))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<ApiResponse<Value>> {
    user::update_profile_for(&ctx, &admin.account, req).await
}

async fn change_password(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    user::change_password_for(&ctx, &admin.account, req).await
}
