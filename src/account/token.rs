/// Signed session tokens
use super::{Account, Role};
use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by every session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

fn secret(config: &AuthConfig) -> AppResult<&str> {
    config
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Misconfigured("JWT secret is not configured".to_string()))
}

/// Issue a token for an account, valid for the configured lifetime
pub fn issue_token(account: &Account, config: &AuthConfig) -> AppResult<String> {
    let secret = secret(config)?;

    let now = Utc::now().timestamp();
    let claims = Claims {
        id: account.id.clone(),
        email: account.email.clone(),
        role: account.role,
        iat: now,
        exp: now + config.jwt_expires_in_secs,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Jwt(format!("Failed to generate token: {}", e)))
}

/// Verify signature and expiry, returning the claims
pub fn verify_token(token: &str, config: &AuthConfig) -> AppResult<Claims> {
    let secret = secret(config)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 60;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Authentication("Token expired, please log in again".to_string())
                }
                _ => AppError::Authentication("Unauthorized: Invalid token".to_string()),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::OtpState;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Some("test-secret-key-for-testing-only-0123456789".to_string()),
            jwt_expires_in_secs: 3600,
            otp_ttl_secs: 600,
        }
    }

    fn account(role: Role) -> Account {
        let now = Utc::now();
        Account {
            id: "acc-1".to_string(),
            email: "a@x.com".to_string(),
            name: Some("A".to_string()),
            password_hash: None,
            role,
            is_premium: false,
            otp: OtpState::Idle,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_round_trip_carries_role() {
        let token = issue_token(&account(Role::Admin), &config()).unwrap();
        let claims = verify_token(&token, &config()).unwrap();
        assert_eq!(claims.id, "acc-1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_missing_secret_is_misconfigured() {
        let mut cfg = config();
        cfg.jwt_secret = None;
        let err = issue_token(&account(Role::User), &cfg).unwrap_err();
        assert!(matches!(err, AppError::Misconfigured(_)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(&account(Role::User), &config()).unwrap();
        let mut other = config();
        other.jwt_secret = Some("another-secret-key-for-testing-0123456789".to_string());
        assert!(matches!(
            verify_token(&token, &other),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut cfg = config();
        cfg.jwt_expires_in_secs = -3600;
        let token = issue_token(&account(Role::User), &cfg).unwrap();
        let err = verify_token(&token, &config()).unwrap_err();
        assert_eq!(err.to_string(), "Token expired, please log in again");
    }
}
