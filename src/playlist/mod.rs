/// Generated playlists and their storage
mod store;

pub use store::PlaylistStore;

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Song count used when the generator omits one
pub const DEFAULT_SONG_COUNT: i64 = 15;

/// Free or premium playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    Default,
    Premium,
}

impl PlaylistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistType::Default => "default",
            PlaylistType::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "default" => Ok(PlaylistType::Default),
            "premium" => Ok(PlaylistType::Premium),
            _ => Err(AppError::Internal(format!("Invalid playlist type: {}", s))),
        }
    }
}

/// Playlist content as returned by the generation service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedPlaylist {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tracks: serde_json::Value,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub song_count: Option<i64>,
    #[serde(default)]
    pub vibe: Option<serde_json::Value>,
}

/// Stored playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    #[serde(rename = "userId")]
    pub account_id: String,
    pub quiz_id: String,
    pub title: String,
    pub description: Option<String>,
    pub tracks: serde_json::Value,
    pub spotify_url: Option<String>,
    pub song_count: i64,
    pub playlist_type: PlaylistType,
    pub created_at: DateTime<Utc>,
}

pub(crate) const PLAYLIST_COLUMNS: &str =
    "id, account_id, quiz_id, title, description, tracks, spotify_url, song_count, playlist_type, created_at";

impl Playlist {
    pub(crate) fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let tracks: String = row.try_get("tracks")?;
        let playlist_type: String = row.try_get("playlist_type")?;

        Ok(Playlist {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            quiz_id: row.try_get("quiz_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            tracks: serde_json::from_str(&tracks)
                .map_err(|e| AppError::Internal(format!("Corrupt playlist tracks: {}", e)))?,
            spotify_url: row.try_get("spotify_url")?,
            song_count: row.try_get("song_count")?,
            playlist_type: PlaylistType::from_str(&playlist_type)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_playlist_tolerates_missing_fields() {
        let parsed: GeneratedPlaylist = serde_json::from_value(json!({
            "title": "Night Drive",
            "tracks": [{"name": "Song"}]
        }))
        .unwrap();

        assert_eq!(parsed.title.as_deref(), Some("Night Drive"));
        assert_eq!(parsed.song_count, None);
        assert!(parsed.vibe.is_none());
    }

    #[test]
    fn test_playlist_type_strings() {
        assert_eq!(PlaylistType::from_str("premium").unwrap(), PlaylistType::Premium);
        assert_eq!(PlaylistType::Default.as_str(), "default");
        assert!(PlaylistType::from_str("gold").is_err());
    }
}
