/// Authenticated profile endpoints
use crate::{
    account::{required, Account, ChangePasswordRequest, UpdateProfileRequest},
    api::{ApiJson, ApiResponse},
    auth::AuthContext,
    context::AppContext,
    error::AppResult,
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

/// Build user profile routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
}

async fn get_profile(auth: AuthContext) -> AppResult<ApiResponse<Value>> {
    Ok(profile_response("Profile fetched successfully", &auth.account))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> AppResult<ApiResponse<Value>> {
    update_profile_for(&ctx, &auth.account, req).await
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    change_password_for(&ctx, &auth.account, req).await
}

pub(super) fn profile_response(message: &str, account: &Account) -> ApiResponse<Value> {
    ApiResponse::ok(message, json!({ "user": account.view() }))
}

/// Rename an authenticated account
pub(super) async fn update_profile_for(
    ctx: &AppContext,
    account: &Account,
    req: UpdateProfileRequest,
) -> AppResult<ApiResponse<Value>> {
    let name = required(&req.name, "Name is required")?;

    let updated = ctx.account_manager.update_profile(&account.id, name).await?;

    Ok(profile_response("Profile updated successfully", &updated))
}

/// Change the password of an authenticated account
pub(super) async fn change_password_for(
    ctx: &AppContext,
    account: &Account,
    req: ChangePasswordRequest,
) -> AppResult<ApiResponse<Value>> {
    let message = "Current and new password are required";
    let current = required(&req.current_password, message)?;
    let new_password = required(&req.new_password, message)?;

    ctx.account_manager
        .change_password(&account.id, current, new_password)
        .await?;

    Ok(ApiResponse::ok("Password changed successfully", json!({})))
}
