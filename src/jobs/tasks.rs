/// Background task implementations
use crate::{api::health, context::AppContext, error::AppResult, metrics};
use chrono::Utc;

/// Fail quizzes stuck in `processing` or `pending`
pub async fn reconcile_stale_quizzes(ctx: &AppContext) -> AppResult<u64> {
    ctx.quiz_service.reconcile_stale_quizzes().await
}

/// Return accounts with an expired, unverified reset code to Idle
pub async fn cleanup_expired_otps(ctx: &AppContext) -> AppResult<u64> {
    ctx.account_manager.clear_expired_otps(Utc::now()).await
}

/// Health check: database ping, uptime gauge and idle rate-limit buckets
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    health::check_database(ctx).await?;
    metrics::update_uptime();
    ctx.rate_limiter.prune();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{RoleScope, Role},
        config::ServerConfig,
        generator::PlaylistGenerator,
        payment::{CheckoutProvider, CheckoutRequest},
        playlist::GeneratedPlaylist,
        quiz::Tier,
    };
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct NoopGenerator;

    #[async_trait]
    impl PlaylistGenerator for NoopGenerator {
        async fn generate(
            &self,
            _answers: &serde_json::Value,
            _user_type: &str,
        ) -> AppResult<GeneratedPlaylist> {
            Ok(GeneratedPlaylist::default())
        }
    }

    struct NoopCheckout;

    #[async_trait]
    impl CheckoutProvider for NoopCheckout {
        async fn create_session(&self, _request: &CheckoutRequest) -> AppResult<String> {
            Ok("https://pay.test/session".to_string())
        }
    }

    async fn create_test_context() -> (AppContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig::for_tests(temp_dir.path().to_path_buf());
        let ctx = AppContext::with_providers(config, Arc::new(NoopGenerator), Arc::new(NoopCheckout))
            .await
            .unwrap();
        (ctx, temp_dir)
    }

    #[tokio::test]
    async fn test_health_check_passes() {
        let (ctx, _temp_dir) = create_test_context().await;
        health_check(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_fails_old_pending_quiz() {
        let (ctx, _temp_dir) = create_test_context().await;

        let account = ctx.account_manager.upsert_guest("old@example.com").await.unwrap();
        let mut conn = ctx.db.acquire().await.unwrap();
        let quiz = crate::quiz::QuizStore::insert(
            &mut conn,
            &account.id,
            &serde_json::json!({"mood": "calm"}),
            Tier::Paid,
        )
        .await
        .unwrap();

        let long_ago = Utc::now() - Duration::hours(48);
        sqlx::query("UPDATE quiz SET updated_at = ?1, created_at = ?1 WHERE id = ?2")
            .bind(long_ago)
            .bind(&quiz.id)
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(reconcile_stale_quizzes(&ctx).await.unwrap(), 1);
        assert_eq!(reconcile_stale_quizzes(&ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_skips_live_codes() {
        let (ctx, _temp_dir) = create_test_context().await;

        ctx.account_manager
            .register("Ana", "ana@example.com", "secret-pass")
            .await
            .unwrap();
        let issued = ctx
            .account_manager
            .request_password_reset("ana@example.com", RoleScope::Any)
            .await
            .unwrap();
        assert_eq!(issued.account.role, Role::User);

        assert_eq!(cleanup_expired_otps(&ctx).await.unwrap(), 0);
    }
}
