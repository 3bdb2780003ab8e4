/// Public credential endpoints shared by users and admins
use crate::{
    account::{
        required, ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
        ResetPasswordRequest, Role, RoleScope, VerifyOtpRequest,
    },
    api::{
        middleware::{session_cookie, ADMIN_COOKIE, USER_COOKIE},
        ApiJson, ApiResponse,
    },
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};

/// Build public auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-otp", post(verify_otp))
        .route("/reset-password", post(reset_password))
}

/// Register endpoint; upgrades a guest with the same email in place
async fn register(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<Response> {
    let message = "Name, email and password are required";
    let name = required(&req.name, message)?;
    let email = required(&req.email, message)?;
    let password = required(&req.password, message)?;

    let account = ctx
        .account_manager
        .register(name.trim(), email, password)
        .await?;

    Ok(
        ApiResponse::ok("User registered successfully", json!({ "user": account.view() }))
            .with_status(StatusCode::CREATED),
    )
}

async fn login(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    login_in_scope(&ctx, req, RoleScope::Any).await
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    forgot_password_in_scope(&ctx, req, RoleScope::Any).await
}

async fn verify_otp(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> AppResult<ApiResponse<Value>> {
    verify_otp_in_scope(&ctx, req, RoleScope::Any).await
}

async fn reset_password(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<ApiResponse<Value>> {
    reset_password_in_scope(&ctx, req, RoleScope::Any).await
}

/// Log in and set the session cookie named after the stored role
pub(super) async fn login_in_scope(
    ctx: &AppContext,
    req: LoginRequest,
    scope: RoleScope,
) -> AppResult<Response> {
    let message = "Email and password are required";
    let email = required(&req.email, message)?;
    let password = required(&req.password, message)?;

    let result = ctx.account_manager.login(email, password, scope).await?;

    let (cookie_name, message) = match result.account.role {
        Role::Admin => (ADMIN_COOKIE, "Admin logged in successfully"),
        _ => (USER_COOKIE, "User logged in successfully"),
    };
    let cookie = session_cookie(
        cookie_name,
        &result.token,
        ctx.config.authentication.jwt_expires_in_secs,
        ctx.config.is_production(),
    );

    let body = ApiResponse::ok(
        message,
        LoginResponse {
            user: result.account.view(),
            token: result.token,
        },
    );

    Ok(([(header::SET_COOKIE, cookie)], body).into_response())
}

/// Issue a reset code and email it; delivery failure fails the request
pub(super) async fn forgot_password_in_scope(
    ctx: &AppContext,
    req: ForgotPasswordRequest,
    scope: RoleScope,
) -> AppResult<ApiResponse<Value>> {
    let email = required(&req.email, "Email is required")?;

    let issued = ctx
        .account_manager
        .request_password_reset(email, scope)
        .await?;

    ctx.mailer
        .send_password_reset_otp(
            &issued.account.email,
            &issued.code,
            issued.account.role,
            ctx.config.authentication.otp_ttl_secs / 60,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to send reset code to {}: {}", issued.account.email, e);
            e
        })?;

    Ok(ApiResponse::ok("Password reset email sent successfully", json!({})))
}

pub(super) async fn verify_otp_in_scope(
    ctx: &AppContext,
    req: VerifyOtpRequest,
    scope: RoleScope,
) -> AppResult<ApiResponse<Value>> {
    let message = "Email and OTP are required";
    let email = required(&req.email, message)?;
    let otp = req
        .otp_string()
        .ok_or_else(|| AppError::Validation(message.to_string()))?;

    ctx.account_manager.verify_otp(email, &otp, scope).await?;

    Ok(ApiResponse::ok("OTP verified successfully", json!({})))
}

pub(super) async fn reset_password_in_scope(
    ctx: &AppContext,
    req: ResetPasswordRequest,
    scope: RoleScope,
) -> AppResult<ApiResponse<Value>> {
    let message = "Email and password are required";
    let email = required(&req.email, message)?;
    let new_password = required(&req.new_password, message)?;

    ctx.account_manager
        .reset_password(email, new_password, scope)
        .await?;

    Ok(ApiResponse::ok("Password reset successfully", json!({})))
}
