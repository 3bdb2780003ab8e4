/// Account management system
///
/// Handles registration (including in-place guest upgrades), role-aware login,
/// token issuance, profile changes and the OTP password-reset flow for both
/// users and admins.

mod manager;
pub mod password;
mod reset;
pub mod token;

pub use manager::{AccountManager, LoginResult};
pub use reset::{generate_otp, OtpIssued};
pub use token::Claims;

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Authorization tier of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Internal(format!("Invalid role: {}", s))),
        }
    }
}

/// Which roles an account lookup may match
///
/// `Any` covers the two roles that own a password (user and admin); guests
/// are never matched by login or password reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    Any,
    Only(Role),
}

impl RoleScope {
    /// Role values bound into `role IN (?, ?)`
    pub(crate) fn roles(&self) -> [&'static str; 2] {
        match self {
            RoleScope::Any => [Role::User.as_str(), Role::Admin.as_str()],
            RoleScope::Only(role) => [role.as_str(), role.as_str()],
        }
    }

    /// Noun used in not-found messages
    pub(crate) fn subject(&self) -> &'static str {
        match self {
            RoleScope::Only(Role::Admin) => "Admin",
            _ => "User",
        }
    }
}

/// Password-reset sub-state; the code, expiry and verified flag always
/// change together
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpState {
    Idle,
    Issued {
        code: String,
        expires_at: DateTime<Utc>,
    },
    Verified {
        code: String,
        expires_at: DateTime<Utc>,
    },
}

impl OtpState {
    fn from_columns(
        code: Option<String>,
        expires_at: Option<DateTime<Utc>>,
        verified: bool,
    ) -> Self {
        match (code, expires_at) {
            (Some(code), Some(expires_at)) if verified => OtpState::Verified { code, expires_at },
            (Some(code), Some(expires_at)) => OtpState::Issued { code, expires_at },
            _ => OtpState::Idle,
        }
    }
}

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub is_premium: bool,
    pub otp: OtpState,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching `Account::from_row`
pub(crate) const ACCOUNT_COLUMNS: &str = "id, email, name, password_hash, role, is_premium, \
     otp_code, otp_expires_at, otp_verified, password_changed_at, created_at, updated_at";

impl Account {
    pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let role: String = row.try_get("role")?;

        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::from_str(&role)?,
            is_premium: row.try_get("is_premium")?,
            otp: OtpState::from_columns(
                row.try_get("otp_code")?,
                row.try_get("otp_expires_at")?,
                row.try_get("otp_verified")?,
            ),
            password_changed_at: row.try_get("password_changed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Public view without credentials or OTP state
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_premium: self.is_premium,
            created_at: self.created_at,
        }
    }
}

/// Account as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: Role,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: AccountView,
    pub token: String,
}

/// Forgot password request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// OTP verification request; the code may arrive as a string or a number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<serde_json::Value>,
}

impl VerifyOtpRequest {
    /// The supplied code as an opaque string
    pub fn otp_string(&self) -> Option<String> {
        match self.otp.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Reset password request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
}

/// Change password request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Profile update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

/// Return the value or a validation error naming the missing fields
pub fn required<'a>(value: &'a Option<String>, message: &str) -> AppResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(message.to_string())),
    }
}
