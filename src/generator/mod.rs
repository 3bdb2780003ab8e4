/// Client for the external playlist generation service
use crate::{
    config::GeneratorConfig,
    error::{AppError, AppResult},
    metrics,
    playlist::GeneratedPlaylist,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Turns quiz answers into playlist content
#[async_trait]
pub trait PlaylistGenerator: Send + Sync {
    /// Generate a playlist; `user_type` is "free" or "paid"
    async fn generate(
        &self,
        answers: &serde_json::Value,
        user_type: &str,
    ) -> AppResult<GeneratedPlaylist>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    answers: &'a serde_json::Value,
    user_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    playlist: GeneratedPlaylist,
}

/// HTTP generator: `POST {endpoint}/generate-playlist`
pub struct HttpPlaylistGenerator {
    endpoint: String,
    http_client: Client,
}

impl HttpPlaylistGenerator {
    pub fn new(config: &GeneratorConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl PlaylistGenerator for HttpPlaylistGenerator {
    async fn generate(
        &self,
        answers: &serde_json::Value,
        user_type: &str,
    ) -> AppResult<GeneratedPlaylist> {
        let url = format!("{}/generate-playlist", self.endpoint);
        let started = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .json(&GenerateRequest { answers, user_type })
            .send()
            .await;

        metrics::GENERATOR_DURATION.observe(started.elapsed().as_secs_f64());

        let response = response.map_err(|e| {
            tracing::error!("Generator request to {} failed: {}", url, e);
            AppError::GenerationFailed(e.to_string())
        })?;

        // Only a plain 200 counts as success
        if response.status() != StatusCode::OK {
            tracing::error!("Generator returned status {}", response.status());
            return Err(AppError::GenerationFailed(format!(
                "generator returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!("Generator response could not be parsed: {}", e);
            AppError::GenerationFailed(format!("malformed generator response: {}", e))
        })?;

        Ok(body.playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{response::IntoResponse, routing::post, Json, Router};
    use serde_json::json;

    /// Serve a throwaway generator on a random local port and return its base URL
    async fn stub_generator(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn generator_at(endpoint: String) -> HttpPlaylistGenerator {
        HttpPlaylistGenerator::new(&GeneratorConfig {
            endpoint,
            timeout_secs: 5,
        })
        .unwrap()
    }

    async fn respond_with(status: StatusCode, body: &'static str) -> String {
        let router = Router::new().route(
            "/generate-playlist",
            post(move || async move {
                (
                    status,
                    [(axum::http::header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response()
            }),
        );
        stub_generator(router).await
    }

    #[test]
    fn test_request_body_shape() {
        let answers = json!({"mood": "chill"});
        let body = serde_json::to_value(GenerateRequest {
            answers: &answers,
            user_type: "free",
        })
        .unwrap();
        assert_eq!(body, json!({"answers": {"mood": "chill"}, "user_type": "free"}));
    }

    #[test]
    fn test_response_body_parses() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "playlist": {
                "title": "Late Night",
                "description": "d",
                "tracks": [],
                "spotify_url": "https://open.spotify.com/x",
                "song_count": 15,
                "vibe": {"energy": "low"}
            }
        }))
        .unwrap();
        assert_eq!(body.playlist.song_count, Some(15));
        assert_eq!(body.playlist.vibe, Some(json!({"energy": "low"})));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let generator = HttpPlaylistGenerator::new(&GeneratorConfig {
            endpoint: "http://ai.local/".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(generator.endpoint, "http://ai.local");
    }

    #[tokio::test]
    async fn test_generate_sends_answers_and_parses_playlist() {
        let router = Router::new().route(
            "/generate-playlist",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(json!({
                    "playlist": {
                        "title": format!("Mix for {}", body["user_type"].as_str().unwrap_or("?")),
                        "tracks": [body["answers"]["mood"].clone()],
                        "song_count": 15
                    }
                }))
            }),
        );
        let endpoint = stub_generator(router).await;

        let playlist = generator_at(endpoint)
            .generate(&json!({"mood": "chill"}), "paid")
            .await
            .unwrap();
        assert_eq!(playlist.title.as_deref(), Some("Mix for paid"));
        assert_eq!(playlist.tracks, json!(["chill"]));
        assert_eq!(playlist.song_count, Some(15));
    }

    #[tokio::test]
    async fn test_created_status_is_not_success() {
        let endpoint = respond_with(StatusCode::CREATED, r#"{"playlist": {"title": "x"}}"#).await;

        let err = generator_at(endpoint)
            .generate(&json!({}), "free")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_server_error_fails_generation() {
        let endpoint = respond_with(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error": "boom"}"#).await;

        let err = generator_at(endpoint)
            .generate(&json!({}), "free")
            .await
            .unwrap_err();
        match err {
            AppError::GenerationFailed(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_fails_generation() {
        let endpoint = respond_with(StatusCode::OK, r#"{"tracks": "#).await;

        let err = generator_at(endpoint)
            .generate(&json!({}), "free")
            .await
            .unwrap_err();
        match err {
            AppError::GenerationFailed(msg) => assert!(msg.starts_with("malformed")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_body_without_playlist_fails_generation() {
        let endpoint = respond_with(StatusCode::OK, r#"{"status": "ok"}"#).await;

        let err = generator_at(endpoint)
            .generate(&json!({}), "free")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_generator_fails_generation() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = generator_at(format!("http://{}", addr))
            .generate(&json!({}), "free")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
    }
}
