use super::{GuestQuizResult, Quiz, QuizOutcome, QuizStore, Tier};
use crate::{
    account::AccountManager,
    config::ServerConfig,
    error::{AppError, AppResult},
    generator::PlaylistGenerator,
    mailer::Mailer,
    metrics,
    payment::{CheckoutProvider, CheckoutRequest},
    playlist::{Playlist, PlaylistStore, PlaylistType},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Runs the quiz → generator → playlist → checkout flows
pub struct QuizService {
    db: SqlitePool,
    quizzes: QuizStore,
    accounts: Arc<AccountManager>,
    generator: Arc<dyn PlaylistGenerator>,
    checkout: Arc<dyn CheckoutProvider>,
    mailer: Arc<Mailer>,
    config: Arc<ServerConfig>,
}

impl QuizService {
    pub fn new(
        db: SqlitePool,
        accounts: Arc<AccountManager>,
        generator: Arc<dyn PlaylistGenerator>,
        checkout: Arc<dyn CheckoutProvider>,
        mailer: Arc<Mailer>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            quizzes: QuizStore::new(db.clone()),
            db,
            accounts,
            generator,
            checkout,
            mailer,
            config,
        }
    }

    /// Submit a quiz for an authenticated account
    pub async fn process_user_quiz(
        &self,
        account_id: &str,
        answers: &serde_json::Value,
        tier: Tier,
    ) -> AppResult<QuizOutcome> {
        match tier {
            Tier::Free => {
                let (quiz, playlist) = self.generate_free(account_id, answers).await?;
                Ok(QuizOutcome::Default {
                    playlist,
                    quiz_id: quiz.id,
                })
            }
            Tier::Paid => {
                let mut conn = self.db.acquire().await?;
                let quiz = QuizStore::insert(&mut conn, account_id, answers, Tier::Paid).await?;
                drop(conn);

                tracing::info!("Created paid quiz {} for account {}", quiz.id, account_id);
                self.open_checkout(&quiz).await
            }
        }
    }

    /// Submit a quiz by email, emailing the playlist link
    pub async fn process_guest_quiz(
        &self,
        email: &str,
        answers: &serde_json::Value,
    ) -> AppResult<GuestQuizResult> {
        let account = self.accounts.upsert_guest(email).await?;
        let (quiz, _playlist) = self.generate_free(&account.id, answers).await?;

        let playlist_link = format!("{}/playlist/{}", self.config.service.frontend_url, quiz.id);

        if let Err(e) = self
            .mailer
            .send_guest_playlist_ready(&account.email, &playlist_link)
            .await
        {
            tracing::warn!("Failed to email playlist {} to {}: {}", quiz.id, account.email, e);
            if self.config.guest_email_failure_is_error {
                return Err(e);
            }
        }

        Ok(GuestQuizResult {
            success: true,
            message: "Playlist sent to email!".to_string(),
            playlist_link,
            quiz_id: quiz.id,
        })
    }

    /// Replace a free quiz/playlist pair with a paid quiz and open checkout
    pub async fn upgrade_playlist(
        &self,
        quiz_id: &str,
        playlist_id: &str,
        account_id: &str,
    ) -> AppResult<QuizOutcome> {
        // Take the write lock up front so a concurrent upgrade waits and then
        // finds no playlist, instead of failing to upgrade a shared read lock
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let original = QuizStore::get_for_account(&mut tx, quiz_id, account_id).await?;

        let deleted = sqlx::query("DELETE FROM playlist WHERE id = ?1 AND quiz_id = ?2")
            .bind(playlist_id)
            .bind(quiz_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound("Playlist not found".to_string()));
        }

        QuizStore::delete(&mut tx, &original.id).await?;
        let quiz = QuizStore::insert(&mut tx, account_id, &original.answers, Tier::Paid).await?;

        tx.commit().await?;

        tracing::info!(
            "Upgraded quiz {} to paid quiz {} for account {}",
            original.id,
            quiz.id,
            account_id
        );

        self.open_checkout(&quiz).await
    }

    /// Fail quizzes left in `processing` or `pending` past their thresholds
    pub async fn reconcile_stale_quizzes(&self) -> AppResult<u64> {
        let now = Utc::now();
        let jobs = &self.config.jobs;

        self.quizzes
            .fail_stale(
                now - Duration::minutes(jobs.stale_quiz_minutes),
                now - Duration::hours(jobs.pending_quiz_hours),
            )
            .await
    }

    /// Free sequence: quiz row, generator call, then playlist and status in one transaction
    async fn generate_free(
        &self,
        account_id: &str,
        answers: &serde_json::Value,
    ) -> AppResult<(Quiz, Playlist)> {
        let mut conn = self.db.acquire().await?;
        let quiz = QuizStore::insert(&mut conn, account_id, answers, Tier::Free).await?;
        drop(conn);

        let generated = match self.generator.generate(answers, Tier::Free.as_str()).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::error!("Generation failed for quiz {}: {}", quiz.id, e);
                self.quizzes.mark_failed(&quiz.id).await?;
                metrics::record_quiz(Tier::Free, "failed");
                return Err(e);
            }
        };

        let mut tx = self.db.begin().await?;
        let playlist =
            PlaylistStore::insert(&mut tx, account_id, &quiz.id, &generated, PlaylistType::Default)
                .await?;
        QuizStore::mark_done(&mut tx, &quiz.id, generated.vibe.as_ref()).await?;
        tx.commit().await?;

        metrics::record_quiz(Tier::Free, "done");
        tracing::info!("Quiz {} done with playlist {}", quiz.id, playlist.id);

        Ok((quiz, playlist))
    }

    async fn open_checkout(&self, quiz: &Quiz) -> AppResult<QuizOutcome> {
        let request = CheckoutRequest::for_quiz(
            &self.config.service.frontend_url,
            &quiz.id,
            &quiz.account_id,
        );

        match self.checkout.create_session(&request).await {
            Ok(checkout_url) => {
                metrics::record_quiz(Tier::Paid, "pending");
                Ok(QuizOutcome::PremiumPayment {
                    checkout_url,
                    quiz_id: quiz.id.clone(),
                })
            }
            Err(e) => {
                tracing::error!("Checkout failed for quiz {}: {}", quiz.id, e);
                self.quizzes.mark_failed(&quiz.id).await?;
                metrics::record_quiz(Tier::Paid, "failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        playlist::GeneratedPlaylist,
        quiz::QuizStatus,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeGenerator {
        fail: bool,
    }

    #[async_trait]
    impl PlaylistGenerator for FakeGenerator {
        async fn generate(
            &self,
            _answers: &serde_json::Value,
            user_type: &str,
        ) -> AppResult<GeneratedPlaylist> {
            assert_eq!(user_type, "free");
            if self.fail {
                return Err(AppError::GenerationFailed("generator returned status 500".into()));
            }
            Ok(GeneratedPlaylist {
                title: Some("Night Drive".to_string()),
                description: Some("Late and slow".to_string()),
                tracks: json!([{"name": "One"}, {"name": "Two"}]),
                spotify_url: Some("https://open.spotify.com/p".to_string()),
                song_count: None,
                vibe: Some(json!({"energy": "low"})),
            })
        }
    }

    #[derive(Default)]
    struct FakeCheckout {
        fail: bool,
        requests: Mutex<Vec<CheckoutRequest>>,
    }

    #[async_trait]
    impl CheckoutProvider for FakeCheckout {
        async fn create_session(&self, request: &CheckoutRequest) -> AppResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(AppError::Payment("declined".into()));
            }
            Ok(format!("https://checkout.test/{}", request.quiz_id))
        }
    }

    struct Harness {
        service: QuizService,
        accounts: Arc<AccountManager>,
        playlists: PlaylistStore,
        quizzes: QuizStore,
        checkout: Arc<FakeCheckout>,
        _dir: tempfile::TempDir,
    }

    async fn harness(generator_fails: bool, checkout_fails: bool) -> Harness {
        let (pool, dir) = db::test_pool().await;
        let config = Arc::new(ServerConfig::for_tests(dir.path().to_path_buf()));
        let accounts = Arc::new(AccountManager::new(pool.clone(), config.clone()));
        let checkout = Arc::new(FakeCheckout {
            fail: checkout_fails,
            ..Default::default()
        });

        let service = QuizService::new(
            pool.clone(),
            accounts.clone(),
            Arc::new(FakeGenerator {
                fail: generator_fails,
            }),
            checkout.clone(),
            Arc::new(Mailer::new(None).unwrap()),
            config,
        );

        Harness {
            service,
            accounts,
            playlists: PlaylistStore::new(pool.clone()),
            quizzes: QuizStore::new(pool),
            checkout,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_free_quiz_creates_linked_playlist() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let outcome = h
            .service
            .process_user_quiz(&user.id, &json!({"mood": "chill"}), Tier::Free)
            .await
            .unwrap();

        let (playlist, quiz_id) = match outcome {
            QuizOutcome::Default { playlist, quiz_id } => (playlist, quiz_id),
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(playlist.quiz_id, quiz_id);
        assert_eq!(playlist.playlist_type, PlaylistType::Default);
        assert_eq!(playlist.song_count, 15);

        let quiz = h.quizzes.get(&quiz_id).await.unwrap();
        assert_eq!(quiz.status, QuizStatus::Done);
        assert_eq!(quiz.vibe_details, Some(json!({"energy": "low"})));
        assert_eq!(h.quizzes.count().await.unwrap(), 1);
        assert_eq!(h.playlists.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_free_quiz_generator_failure() {
        let h = harness(true, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let err = h
            .service
            .process_user_quiz(&user.id, &json!({"mood": "chill"}), Tier::Free)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));

        assert_eq!(h.quizzes.count_by_status(QuizStatus::Failed).await.unwrap(), 1);
        assert_eq!(h.playlists.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_paid_quiz_opens_checkout() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let outcome = h
            .service
            .process_user_quiz(&user.id, &json!({"mood": "party"}), Tier::Paid)
            .await
            .unwrap();

        let quiz_id = match outcome {
            QuizOutcome::PremiumPayment { checkout_url, quiz_id } => {
                assert_eq!(checkout_url, format!("https://checkout.test/{}", quiz_id));
                quiz_id
            }
            other => panic!("unexpected outcome {:?}", other),
        };

        let quiz = h.quizzes.get(&quiz_id).await.unwrap();
        assert_eq!(quiz.status, QuizStatus::Pending);
        assert!(quiz.premium_requested);
        assert_eq!(quiz.song_count, 50);

        let requests = h.checkout.requests.lock().unwrap();
        assert_eq!(requests[0].account_id, user.id);
        assert_eq!(requests[0].cancel_url, "http://frontend.test/cancel");
        assert_eq!(h.playlists.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_paid_quiz_checkout_failure_marks_failed() {
        let h = harness(false, true).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let err = h
            .service
            .process_user_quiz(&user.id, &json!({}), Tier::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
        assert_eq!(h.quizzes.count_by_status(QuizStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_guest_quiz_upserts_guest_and_returns_link() {
        let h = harness(false, false).await;

        let result = h
            .service
            .process_guest_quiz("Guest@X.com", &json!({"mood": "chill"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.message, "Playlist sent to email!");
        assert_eq!(
            result.playlist_link,
            format!("http://frontend.test/playlist/{}", result.quiz_id)
        );

        let guest = h.accounts.get_account_by_email("guest@x.com").await.unwrap().unwrap();
        assert_eq!(guest.role, crate::account::Role::Guest);

        let playlist = h.playlists.get_by_quiz(&result.quiz_id).await.unwrap();
        assert_eq!(playlist.account_id, guest.id);
    }

    #[tokio::test]
    async fn test_guest_quiz_generator_failure_is_surfaced() {
        let h = harness(true, false).await;

        let err = h
            .service
            .process_guest_quiz("g@x.com", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
        assert_eq!(h.quizzes.count_by_status(QuizStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_replaces_pair_with_paid_quiz() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();
        let answers = json!({"mood": "chill"});

        let (playlist, quiz_id) = match h
            .service
            .process_user_quiz(&user.id, &answers, Tier::Free)
            .await
            .unwrap()
        {
            QuizOutcome::Default { playlist, quiz_id } => (playlist, quiz_id),
            other => panic!("unexpected outcome {:?}", other),
        };

        let outcome = h
            .service
            .upgrade_playlist(&quiz_id, &playlist.id, &user.id)
            .await
            .unwrap();

        let new_quiz_id = match outcome {
            QuizOutcome::PremiumPayment { quiz_id, .. } => quiz_id,
            other => panic!("unexpected outcome {:?}", other),
        };

        assert!(matches!(h.quizzes.get(&quiz_id).await, Err(AppError::NotFound(_))));
        assert_eq!(h.playlists.count().await.unwrap(), 0);

        let new_quiz = h.quizzes.get(&new_quiz_id).await.unwrap();
        assert_eq!(new_quiz.answers, answers);
        assert_eq!(new_quiz.status, QuizStatus::Pending);
    }

    #[tokio::test]
    async fn test_upgrade_with_foreign_playlist_leaves_originals() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let mut pairs = Vec::new();
        for _ in 0..2 {
            match h
                .service
                .process_user_quiz(&user.id, &json!({}), Tier::Free)
                .await
                .unwrap()
            {
                QuizOutcome::Default { playlist, quiz_id } => pairs.push((quiz_id, playlist.id)),
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        // Playlist of the second quiz against the first quiz id
        let err = h
            .service
            .upgrade_playlist(&pairs[0].0, &pairs[1].1, &user.id)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Playlist not found");

        assert_eq!(h.quizzes.count().await.unwrap(), 2);
        assert_eq!(h.playlists.count().await.unwrap(), 2);
        assert!(h.checkout.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upgrade_of_other_accounts_quiz() {
        let h = harness(false, false).await;
        let owner = h.accounts.register("A", "a@x.com", "pw").await.unwrap();
        let other = h.accounts.register("B", "b@x.com", "pw").await.unwrap();

        let (playlist, quiz_id) = match h
            .service
            .process_user_quiz(&owner.id, &json!({}), Tier::Free)
            .await
            .unwrap()
        {
            QuizOutcome::Default { playlist, quiz_id } => (playlist, quiz_id),
            other => panic!("unexpected outcome {:?}", other),
        };

        let err = h
            .service
            .upgrade_playlist(&quiz_id, &playlist.id, &other.id)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Quiz not found");
        assert_eq!(h.playlists.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_checkout_failure_marks_new_quiz_failed() {
        let h = harness(false, true).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let (playlist, quiz_id) = match h
            .service
            .process_user_quiz(&user.id, &json!({"k": "v"}), Tier::Free)
            .await
            .unwrap()
        {
            QuizOutcome::Default { playlist, quiz_id } => (playlist, quiz_id),
            other => panic!("unexpected outcome {:?}", other),
        };

        let err = h
            .service
            .upgrade_playlist(&quiz_id, &playlist.id, &user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
        assert_eq!(h.quizzes.count_by_status(QuizStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_fails_old_processing_quizzes() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        let old = Utc::now() - Duration::hours(2);
        sqlx::query(
            "INSERT INTO quiz (id, account_id, answers, status, song_count, created_at, updated_at)
             VALUES ('stuck', ?1, '{}', 'processing', 15, ?2, ?2),
                    ('waiting', ?1, '{}', 'pending', 50, ?2, ?2)",
        )
        .bind(&user.id)
        .bind(old)
        .execute(&h.service.db)
        .await
        .unwrap();

        let failed = h.service.reconcile_stale_quizzes().await.unwrap();
        assert_eq!(failed, 1);
        assert_eq!(h.quizzes.get("stuck").await.unwrap().status, QuizStatus::Failed);
        assert_eq!(h.quizzes.get("waiting").await.unwrap().status, QuizStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upgrades_of_same_pair() {
        let h = harness(false, false).await;
        let user = h.accounts.register("A", "a@x.com", "pw").await.unwrap();

        for _ in 0..5 {
            let (playlist, quiz_id) = match h
                .service
                .process_user_quiz(&user.id, &json!({"mood": "chill"}), Tier::Free)
                .await
                .unwrap()
            {
                QuizOutcome::Default { playlist, quiz_id } => (playlist, quiz_id),
                other => panic!("unexpected outcome {:?}", other),
            };

            let (first, second) = tokio::join!(
                h.service.upgrade_playlist(&quiz_id, &playlist.id, &user.id),
                h.service.upgrade_playlist(&quiz_id, &playlist.id, &user.id),
            );

            let results = [first, second];
            let wins = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(wins, 1);
            for result in results.iter().filter(|r| r.is_err()) {
                assert!(
                    matches!(result, Err(AppError::NotFound(_))),
                    "loser should see NotFound, got {:?}",
                    result
                );
            }
        }

        assert_eq!(h.quizzes.count_by_status(QuizStatus::Pending).await.unwrap(), 5);
        assert_eq!(h.playlists.count().await.unwrap(), 0);
    }
}
