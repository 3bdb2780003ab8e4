/// Authentication extractors
use crate::{
    account::{token, Account, Role},
    api::middleware::{extract_bearer_token, extract_cookie, extract_token, ADMIN_COOKIE, USER_COOKIE},
    context::AppContext,
    error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated account (user or admin), from bearer token or `token` cookie
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, USER_COOKIE).ok_or_else(|| {
            AppError::Authentication("Unauthorized: No token provided".to_string())
        })?;

        let claims = token::verify_token(&token, &state.config.authentication)?;

        let account = match state.account_manager.get_account(&claims.id).await {
            Ok(account) => account,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication(
                    "Invalid token: User does not exist".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        if account.role == Role::Guest {
            return Err(AppError::Authentication(
                "Unauthorized: Invalid token".to_string(),
            ));
        }

        Ok(AuthContext { account })
    }
}

/// Authenticated admin; the role claim and the stored role must both be admin
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .or_else(|| extract_cookie(&parts.headers, ADMIN_COOKIE))
            .ok_or_else(|| {
                AppError::Authentication("Unauthorized: No token provided".to_string())
            })?;

        let claims = token::verify_token(&token, &state.config.authentication)?;

        if claims.role != Role::Admin {
            tracing::warn!("Non-admin token for {} used on admin route", claims.id);
            return Err(AppError::Authorization(
                "Forbidden: Admin access required".to_string(),
            ));
        }

        let account = match state.account_manager.get_account(&claims.id).await {
            Ok(account) if account.role == Role::Admin => account,
            Ok(_) | Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication(
                    "Invalid token: Admin does not exist".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        Ok(AdminAuthContext { account })
    }
}
