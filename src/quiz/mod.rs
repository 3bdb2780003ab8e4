/// Quiz intake, playlist generation and premium upgrades
mod service;
mod store;

pub use service::QuizService;
pub use store::QuizStore;

use crate::{
    error::{AppError, AppResult},
    playlist::Playlist,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Song counts per tier
pub const FREE_SONG_COUNT: i64 = 15;
pub const PAID_SONG_COUNT: i64 = 50;

/// Free or paid quiz submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Paid,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
        }
    }

    pub fn song_count(&self) -> i64 {
        match self {
            Tier::Free => FREE_SONG_COUNT,
            Tier::Paid => PAID_SONG_COUNT,
        }
    }

    /// Status a new quiz of this tier starts in
    pub fn initial_status(&self) -> QuizStatus {
        match self {
            Tier::Free => QuizStatus::Processing,
            Tier::Paid => QuizStatus::Pending,
        }
    }
}

/// Quiz lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Processing,
    Pending,
    Done,
    Failed,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Processing => "processing",
            QuizStatus::Pending => "pending",
            QuizStatus::Done => "done",
            QuizStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "processing" => Ok(QuizStatus::Processing),
            "pending" => Ok(QuizStatus::Pending),
            "done" => Ok(QuizStatus::Done),
            "failed" => Ok(QuizStatus::Failed),
            _ => Err(AppError::Internal(format!("Invalid quiz status: {}", s))),
        }
    }
}

/// Stored quiz submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    #[serde(rename = "userId")]
    pub account_id: String,
    pub answers: serde_json::Value,
    pub status: QuizStatus,
    pub premium_requested: bool,
    pub song_count: i64,
    pub vibe_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const QUIZ_COLUMNS: &str =
    "id, account_id, answers, status, premium_requested, song_count, vibe_details, created_at, updated_at";

fn parse_json(raw: &str, what: &str) -> AppResult<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| AppError::Internal(format!("Corrupt quiz {}: {}", what, e)))
}

impl Quiz {
    pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let answers: String = row.try_get("answers")?;
        let status: String = row.try_get("status")?;
        let vibe: Option<String> = row.try_get("vibe_details")?;

        Ok(Quiz {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            answers: parse_json(&answers, "answers")?,
            status: QuizStatus::from_str(&status)?,
            premium_requested: row.try_get("premium_requested")?,
            song_count: row.try_get("song_count")?,
            vibe_details: vibe.as_deref().map(|v| parse_json(v, "vibe")).transpose()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Result of an authenticated quiz submission or upgrade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizOutcome {
    /// Free playlist generated immediately
    #[serde(rename_all = "camelCase")]
    Default { playlist: Playlist, quiz_id: String },
    /// Paid quiz awaiting checkout
    #[serde(rename_all = "camelCase")]
    PremiumPayment { checkout_url: String, quiz_id: String },
}

/// Result of a guest quiz submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestQuizResult {
    pub success: bool,
    pub message: String,
    pub playlist_link: String,
    pub quiz_id: String,
}

/// Authenticated quiz submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    pub answers: Option<serde_json::Value>,
    pub user_type: Option<Tier>,
}

/// Guest quiz submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestQuizRequest {
    pub email: Option<String>,
    pub answers: Option<serde_json::Value>,
}

/// Upgrade body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePlaylistRequest {
    pub quiz_id: Option<String>,
    pub playlist_id: Option<String>,
}

/// Answers must be present and non-null
pub fn required_answers(answers: &Option<serde_json::Value>) -> AppResult<&serde_json::Value> {
    match answers {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(AppError::Validation("Answers are required".to_string())),
    }
}
