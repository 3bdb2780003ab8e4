use super::{Quiz, QuizStatus, Tier, QUIZ_COLUMNS};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Quiz persistence
#[derive(Clone)]
pub struct QuizStore {
    db: SqlitePool,
}

impl QuizStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new quiz in the tier's initial state
    pub async fn insert(
        conn: &mut SqliteConnection,
        account_id: &str,
        answers: &serde_json::Value,
        tier: Tier,
    ) -> AppResult<Quiz> {
        let now = Utc::now();
        let quiz = Quiz {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            answers: answers.clone(),
            status: tier.initial_status(),
            premium_requested: tier == Tier::Paid,
            song_count: tier.song_count(),
            vibe_details: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO quiz (id, account_id, answers, status, premium_requested, song_count, vibe_details, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)",
        )
        .bind(&quiz.id)
        .bind(&quiz.account_id)
        .bind(quiz.answers.to_string())
        .bind(quiz.status.as_str())
        .bind(quiz.premium_requested)
        .bind(quiz.song_count)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(quiz)
    }

    /// Load a quiz owned by `account_id`
    pub async fn get_for_account(
        conn: &mut SqliteConnection,
        quiz_id: &str,
        account_id: &str,
    ) -> AppResult<Quiz> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM quiz WHERE id = ?1 AND account_id = ?2",
            QUIZ_COLUMNS
        ))
        .bind(quiz_id)
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        Quiz::from_row(&row)
    }

    pub async fn get(&self, quiz_id: &str) -> AppResult<Quiz> {
        let row = sqlx::query(&format!("SELECT {} FROM quiz WHERE id = ?1", QUIZ_COLUMNS))
            .bind(quiz_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))?;

        Quiz::from_row(&row)
    }

    /// Mark a processing quiz done with the generator's vibe metadata
    ///
    /// A quiz that reconciliation already failed stays failed; that is
    /// reported as `Conflict`.
    pub async fn mark_done(
        conn: &mut SqliteConnection,
        quiz_id: &str,
        vibe: Option<&serde_json::Value>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE quiz SET status = 'done', vibe_details = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'processing'",
        )
        .bind(vibe.map(|v| v.to_string()))
        .bind(Utc::now())
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Quiz {} is no longer processing",
                quiz_id
            )));
        }

        Ok(())
    }

    pub async fn mark_failed(&self, quiz_id: &str) -> AppResult<()> {
        sqlx::query("UPDATE quiz SET status = 'failed', updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(quiz_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    pub async fn delete(conn: &mut SqliteConnection, quiz_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM quiz WHERE id = ?1")
            .bind(quiz_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM quiz")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Fail quizzes stuck in `processing` since before `processing_before`
    /// or in `pending` since before `pending_before`
    pub async fn fail_stale(
        &self,
        processing_before: DateTime<Utc>,
        pending_before: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE quiz SET status = 'failed', updated_at = ?1
             WHERE (status = 'processing' AND created_at < ?2)
                OR (status = 'pending' AND created_at < ?3)",
        )
        .bind(Utc::now())
        .bind(processing_before)
        .bind(pending_before)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Count quizzes per status
    pub async fn count_by_status(&self, status: QuizStatus) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM quiz WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }
}
