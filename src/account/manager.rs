/// Account manager implementation using runtime queries
use super::{password, token, Account, Role, RoleScope, ACCOUNT_COLUMNS};
use crate::{
    config::ServerConfig,
    error::{AppError, AppResult},
    metrics,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub account: Account,
    pub token: String,
}

/// Account manager service
pub struct AccountManager {
    pub(super) db: SqlitePool,
    pub(super) config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Register a user, upgrading an existing guest record in place
    ///
    /// Fails with `Conflict` when the email already belongs to a user or admin.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<Account> {
        let email = normalize_email(email)?;
        let name = name.trim();

        if let Some(existing) = self.get_account_by_email(&email).await? {
            if existing.role != Role::Guest {
                return Err(AppError::Conflict("User already exists".to_string()));
            }
            tracing::info!("Upgrading guest account {} to user", existing.id);
        }

        let password_hash = password::hash_password(password).await?;
        let now = Utc::now();

        // Inserts a new user, or flips a guest row to user; a user/admin row is left alone
        let result = sqlx::query(
            "INSERT INTO account (id, email, name, password_hash, role, is_premium, otp_verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'user', 0, 0, ?5, ?5)
             ON CONFLICT(email) DO UPDATE SET
                name = excluded.name,
                password_hash = excluded.password_hash,
                role = 'user',
                updated_at = excluded.updated_at
             WHERE account.role = 'guest'",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(name)
        .bind(&password_hash)
        .bind(now)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let account = self
            .get_account_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Internal("Registered account vanished".to_string()))?;

        tracing::info!("Registered user {} ({})", account.id, account.email);

        Ok(account)
    }

    /// Find or create the guest record for an email
    ///
    /// Existing accounts keep their role.
    pub async fn upsert_guest(&self, email: &str) -> AppResult<Account> {
        let email = normalize_email(email)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO account (id, email, role, is_premium, otp_verified, created_at, updated_at)
             VALUES (?1, ?2, 'guest', 0, 0, ?3, ?3)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(now)
        .execute(&self.db)
        .await?;

        self.get_account_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Internal("Guest account vanished".to_string()))
    }

    /// Authenticate by email and password
    ///
    /// The role comes from the stored record. Errors, in order of checking:
    /// `NotFound`, `InvalidCredential`, `Misconfigured` (no signing secret).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        scope: RoleScope,
    ) -> AppResult<LoginResult> {
        let email = normalize_email(email)?;

        let account = match self.find_in_scope(&email, scope).await? {
            Some(account) => account,
            None => {
                metrics::record_login("not_found");
                return Err(AppError::NotFound(format!("{} not found", scope.subject())));
            }
        };

        let valid = match account.password_hash.as_deref() {
            Some(hash) => password::verify_password(password, hash).await?,
            None => false,
        };

        if !valid {
            metrics::record_login("invalid_password");
            return Err(AppError::InvalidCredential("Invalid password".to_string()));
        }

        let token = token::issue_token(&account, &self.config.authentication)?;

        metrics::record_login("success");
        tracing::info!("{} {} logged in", account.role.as_str(), account.id);

        Ok(LoginResult { account, token })
    }

    /// Change password after checking the current one
    pub async fn change_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<()> {
        let account = self.get_account(account_id).await?;

        let valid = match account.password_hash.as_deref() {
            Some(hash) => password::verify_password(current_password, hash).await?,
            None => false,
        };

        if !valid {
            return Err(AppError::InvalidCredential(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = password::hash_password(new_password).await?;
        let now = Utc::now();

        sqlx::query(
            "UPDATE account SET password_hash = ?1, password_changed_at = ?2, updated_at = ?2 WHERE id = ?3",
        )
        .bind(&password_hash)
        .bind(now)
        .bind(account_id)
        .execute(&self.db)
        .await?;

        tracing::info!("Password changed for account {}", account_id);

        Ok(())
    }

    /// Update display name
    pub async fn update_profile(&self, account_id: &str, name: &str) -> AppResult<Account> {
        let result = sqlx::query("UPDATE account SET name = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(name.trim())
            .bind(Utc::now())
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        self.get_account(account_id).await
    }

    /// Get account by id
    pub async fn get_account(&self, account_id: &str) -> AppResult<Account> {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE id = ?1", ACCOUNT_COLUMNS))
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Account::from_row(&row)
    }

    /// Find account by email regardless of role
    pub async fn get_account_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        sqlx::query(&format!("SELECT {} FROM account WHERE email = ?1", ACCOUNT_COLUMNS))
            .bind(email)
            .fetch_optional(&self.db)
            .await?
            .map(|row| Account::from_row(&row))
            .transpose()
    }

    /// Find account by email among the roles allowed by `scope`
    pub(super) async fn find_in_scope(
        &self,
        email: &str,
        scope: RoleScope,
    ) -> AppResult<Option<Account>> {
        let [first, second] = scope.roles();

        sqlx::query(&format!(
            "SELECT {} FROM account WHERE email = ?1 AND role IN (?2, ?3)",
            ACCOUNT_COLUMNS
        ))
        .bind(email)
        .bind(first)
        .bind(second)
        .fetch_optional(&self.db)
        .await?
        .map(|row| Account::from_row(&row))
        .transpose()
    }

    /// List non-admin accounts, newest first
    pub async fn list_accounts(&self, limit: i64, offset: i64) -> AppResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM account WHERE role != 'admin' ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            ACCOUNT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Account::from_row).collect()
    }

    /// Count non-admin accounts
    pub async fn count_accounts(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE role != 'admin'")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Hard-delete a non-admin account; quizzes and playlists cascade
    pub async fn delete_account(&self, account_id: &str) -> AppResult<()> {
        let account = self.get_account(account_id).await?;

        if account.role == Role::Admin {
            return Err(AppError::Authorization(
                "Admin accounts cannot be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM account WHERE id = ?1 AND role != 'admin'")
            .bind(account_id)
            .execute(&self.db)
            .await?;

        tracing::info!("Deleted account {} ({})", account.id, account.email);

        Ok(())
    }
}

/// Trim and lowercase an email, rejecting malformed addresses
pub(crate) fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();

    if !email.validate_email() {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    Ok(email)
}
