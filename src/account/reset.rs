/// OTP password reset: request, verify, reset
use super::{manager::normalize_email, password, Account, OtpState, RoleScope, ACCOUNT_COLUMNS};
use crate::{
    error::{AppError, AppResult},
    metrics,
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::AccountManager;

/// A freshly issued reset code; the caller delivers it
#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub account: Account,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Six-digit numeric code, uniform over 100000..=999999
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl AccountManager {
    /// Issue a reset code for the account matching `email` within `scope`
    pub async fn request_password_reset(
        &self,
        email: &str,
        scope: RoleScope,
    ) -> AppResult<OtpIssued> {
        self.request_password_reset_at(email, scope, Utc::now()).await
    }

    pub(crate) async fn request_password_reset_at(
        &self,
        email: &str,
        scope: RoleScope,
        now: DateTime<Utc>,
    ) -> AppResult<OtpIssued> {
        let email = normalize_email(email)?;
        let account = self
            .find_in_scope(&email, scope)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", scope.subject())))?;

        let code = generate_otp();
        let expires_at = now + Duration::seconds(self.config.authentication.otp_ttl_secs);

        sqlx::query(
            "UPDATE account SET otp_code = ?1, otp_expires_at = ?2, otp_verified = 0, updated_at = ?3 WHERE id = ?4",
        )
        .bind(&code)
        .bind(expires_at)
        .bind(now)
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        metrics::record_otp_event("issued");
        tracing::info!("Issued reset code for account {}", account.id);

        Ok(OtpIssued {
            account,
            code,
            expires_at,
        })
    }

    /// Mark the issued code as verified
    ///
    /// A mismatch is `InvalidOtp`; a matching but expired code is `OtpExpired`.
    pub async fn verify_otp(&self, email: &str, otp: &str, scope: RoleScope) -> AppResult<()> {
        self.verify_otp_at(email, otp, scope, Utc::now()).await
    }

    pub(crate) async fn verify_otp_at(
        &self,
        email: &str,
        otp: &str,
        scope: RoleScope,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let email = normalize_email(email)?;
        let account = self
            .find_in_scope(&email, scope)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", scope.subject())))?;

        let (code, expires_at) = match &account.otp {
            OtpState::Idle => {
                metrics::record_otp_event("invalid");
                return Err(AppError::InvalidOtp);
            }
            OtpState::Issued { code, expires_at } | OtpState::Verified { code, expires_at } => {
                (code, *expires_at)
            }
        };

        if code.as_str() != otp.trim() {
            metrics::record_otp_event("invalid");
            return Err(AppError::InvalidOtp);
        }

        if expires_at < now {
            metrics::record_otp_event("expired");
            return Err(AppError::OtpExpired);
        }

        // Precondition on the matched code: a concurrent reissue makes this a no-op
        let result = sqlx::query(
            "UPDATE account SET otp_verified = 1, updated_at = ?1 WHERE id = ?2 AND otp_code = ?3",
        )
        .bind(now)
        .bind(&account.id)
        .bind(code)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            metrics::record_otp_event("invalid");
            return Err(AppError::InvalidOtp);
        }

        metrics::record_otp_event("verified");
        tracing::info!("Verified reset code for account {}", account.id);

        Ok(())
    }

    /// Set a new password after a verified code, returning the OTP state to idle
    pub async fn reset_password(
        &self,
        email: &str,
        new_password: &str,
        scope: RoleScope,
    ) -> AppResult<()> {
        let email = normalize_email(email)?;
        let not_found = || {
            AppError::NotFound(format!(
                "{} not found or OTP not verified",
                scope.subject()
            ))
        };

        let [first, second] = scope.roles();
        let row = sqlx::query(&format!(
            "SELECT {} FROM account WHERE email = ?1 AND role IN (?2, ?3) AND otp_verified = 1",
            ACCOUNT_COLUMNS
        ))
        .bind(&email)
        .bind(first)
        .bind(second)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(not_found)?;
        let account = Account::from_row(&row)?;

        let password_hash = password::hash_password(new_password).await?;
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE account SET password_hash = ?1, otp_code = NULL, otp_expires_at = NULL,
                otp_verified = 0, password_changed_at = ?2, updated_at = ?2
             WHERE id = ?3 AND otp_verified = 1",
        )
        .bind(&password_hash)
        .bind(now)
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found());
        }

        metrics::record_otp_event("reset");
        tracing::info!("Password reset for account {}", account.id);

        Ok(())
    }

    /// Return expired, unverified codes to idle; returns the number cleared
    pub async fn clear_expired_otps(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE account SET otp_code = NULL, otp_expires_at = NULL, otp_verified = 0
             WHERE otp_code IS NOT NULL AND otp_verified = 0 AND otp_expires_at < ?1",
        )
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}
