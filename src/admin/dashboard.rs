use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Number of playlists shown in recent activity
const RECENT_ACTIVITY_LIMIT: i64 = 5;

/// Headline counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    pub total_users: i64,
    pub total_playlists: i64,
    pub total_quizzes: i64,
    pub paid_users: i64,
    pub free_users: i64,
}

/// One of the latest playlists
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub user: String,
    pub playlist_title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub playlist_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub totals: DashboardTotals,
    pub recent_activity: Vec<RecentActivity>,
}

/// Dashboard aggregates over accounts, quizzes and playlists
#[derive(Clone)]
pub struct AdminDashboard {
    db: SqlitePool,
}

impl AdminDashboard {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn get_dashboard(&self) -> AppResult<Dashboard> {
        let (total_users, total_playlists, total_quizzes, paid_users, recent_activity) = tokio::try_join!(
            self.scalar("SELECT COUNT(*) FROM account WHERE role != 'admin'"),
            self.scalar("SELECT COUNT(*) FROM playlist"),
            self.scalar("SELECT COUNT(*) FROM quiz"),
            self.scalar(
                "SELECT COUNT(DISTINCT account_id) FROM playlist WHERE playlist_type = 'premium'"
            ),
            self.recent_activity(),
        )?;

        Ok(Dashboard {
            totals: DashboardTotals {
                total_users,
                total_playlists,
                total_quizzes,
                paid_users,
                free_users: (total_users - paid_users).max(0),
            },
            recent_activity,
        })
    }

    async fn scalar(&self, sql: &'static str) -> AppResult<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(&self.db).await?)
    }

    async fn recent_activity(&self) -> AppResult<Vec<RecentActivity>> {
        let rows = sqlx::query(
            "SELECT p.id, p.title, p.playlist_type, p.created_at, a.email, a.name
             FROM playlist p LEFT JOIN account a ON a.id = p.account_id
             ORDER BY p.created_at DESC
             LIMIT ?1",
        )
        .bind(RECENT_ACTIVITY_LIMIT)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> AppResult<RecentActivity> {
                let email: Option<String> = row.try_get("email")?;
                let name: Option<String> = row.try_get("name")?;
                let title: String = row.try_get("title")?;
                let playlist_type: String = row.try_get("playlist_type")?;

                Ok(RecentActivity {
                    user: non_empty(email)
                        .or_else(|| non_empty(name))
                        .unwrap_or_else(|| "Guest".to_string()),
                    playlist_title: non_empty(Some(title)).unwrap_or_else(|| "Untitled".to_string()),
                    kind: if playlist_type == "premium" { "Paid" } else { "Free" }.to_string(),
                    date: row.try_get("created_at")?,
                    playlist_id: row.try_get("id")?,
                })
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
