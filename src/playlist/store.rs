use super::{GeneratedPlaylist, Playlist, PlaylistType, DEFAULT_SONG_COUNT, PLAYLIST_COLUMNS};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Playlist persistence
#[derive(Clone)]
pub struct PlaylistStore {
    db: SqlitePool,
}

impl PlaylistStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a playlist on an open connection or transaction
    pub async fn insert(
        conn: &mut SqliteConnection,
        account_id: &str,
        quiz_id: &str,
        generated: &GeneratedPlaylist,
        playlist_type: PlaylistType,
    ) -> AppResult<Playlist> {
        let playlist = Playlist {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            quiz_id: quiz_id.to_string(),
            title: generated
                .title
                .clone()
                .unwrap_or_else(|| "Untitled".to_string()),
            description: generated.description.clone(),
            tracks: if generated.tracks.is_null() {
                serde_json::Value::Array(Vec::new())
            } else {
                generated.tracks.clone()
            },
            spotify_url: generated.spotify_url.clone(),
            song_count: generated.song_count.unwrap_or(DEFAULT_SONG_COUNT),
            playlist_type,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO playlist (id, account_id, quiz_id, title, description, tracks, spotify_url, song_count, playlist_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&playlist.id)
        .bind(&playlist.account_id)
        .bind(&playlist.quiz_id)
        .bind(&playlist.title)
        .bind(&playlist.description)
        .bind(playlist.tracks.to_string())
        .bind(&playlist.spotify_url)
        .bind(playlist.song_count)
        .bind(playlist.playlist_type.as_str())
        .bind(playlist.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(playlist)
    }

    /// Playlist generated for a quiz; used by the guest link
    pub async fn get_by_quiz(&self, quiz_id: &str) -> AppResult<Playlist> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM playlist WHERE quiz_id = ?1 ORDER BY created_at DESC LIMIT 1",
            PLAYLIST_COLUMNS
        ))
        .bind(quiz_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".to_string()))?;

        Playlist::from_row(&row)
    }

    /// All playlists of an account, oldest first
    pub async fn list_for_account(&self, account_id: &str) -> AppResult<Vec<Playlist>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM playlist WHERE account_id = ?1 ORDER BY created_at ASC",
            PLAYLIST_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Playlist::from_row).collect()
    }

    /// All playlists, newest first
    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Playlist>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM playlist ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            PLAYLIST_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Playlist::from_row).collect()
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM playlist")
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Delete a playlist by id
    pub async fn delete(&self, playlist_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM playlist WHERE id = ?1")
            .bind(playlist_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Playlist not found".to_string()));
        }

        tracing::info!("Deleted playlist {}", playlist_id);

        Ok(())
    }
}
