/// Hosted checkout sessions for the premium tier
use crate::{
    config::PaymentConfig,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// What a checkout session is opened for
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub quiz_id: String,
    pub account_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutRequest {
    /// Redirect URLs derived from the frontend base URL
    pub fn for_quiz(frontend_url: &str, quiz_id: &str, account_id: &str) -> Self {
        Self {
            quiz_id: quiz_id.to_string(),
            account_id: account_id.to_string(),
            success_url: format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", frontend_url),
            cancel_url: format!("{}/cancel", frontend_url),
        }
    }
}

/// Opens payment sessions and returns the URL the client is sent to
#[async_trait]
pub trait CheckoutProvider: Send + Sync {
    async fn create_session(&self, request: &CheckoutRequest) -> AppResult<String>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    url: Option<String>,
}

/// Stripe Checkout over its form-encoded REST API
pub struct StripeCheckout {
    config: PaymentConfig,
    http_client: Client,
}

impl StripeCheckout {
    pub fn new(config: PaymentConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn form(&self, request: &CheckoutRequest) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "payment".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", self.config.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                self.config.price_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                self.config.product_name.clone(),
            ),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("metadata[quizId]", request.quiz_id.clone()),
            ("metadata[userId]", request.account_id.clone()),
            ("metadata[premium]", "true".to_string()),
        ]
    }
}

#[async_trait]
impl CheckoutProvider for StripeCheckout {
    async fn create_session(&self, request: &CheckoutRequest) -> AppResult<String> {
        let secret_key = self.config.secret_key.as_deref().ok_or_else(|| {
            AppError::Misconfigured("Payment secret key is not configured".to_string())
        })?;

        let url = format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(secret_key)
            .form(&self.form(request))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Checkout request failed: {}", e);
                AppError::Payment(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Checkout provider returned {}: {}", status, body);
            return Err(AppError::Payment(format!(
                "checkout provider returned status {}",
                status
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("malformed checkout response: {}", e)))?;

        session
            .url
            .ok_or_else(|| AppError::Payment("checkout session has no URL".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Form, Json, Router,
    };
    use serde_json::json;
    use std::{collections::HashMap, path::PathBuf};

    fn checkout() -> StripeCheckout {
        StripeCheckout::new(ServerConfig::for_tests(PathBuf::from("./data")).payment).unwrap()
    }

    /// Checkout client pointed at a throwaway local provider
    async fn checkout_against(router: Router) -> StripeCheckout {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut config = ServerConfig::for_tests(PathBuf::from("./data")).payment;
        config.api_base = format!("http://{}/", addr);
        StripeCheckout::new(config).unwrap()
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest::for_quiz("https://app.test", "q1", "u1")
    }

    #[test]
    fn test_redirect_urls() {
        let request = CheckoutRequest::for_quiz("https://app.test", "q1", "u1");
        assert_eq!(
            request.success_url,
            "https://app.test/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://app.test/cancel");
    }

    #[test]
    fn test_form_carries_price_and_metadata() {
        let form = checkout().form(&CheckoutRequest::for_quiz("https://app.test", "q1", "u1"));
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("900"));
        assert_eq!(
            get("line_items[0][price_data][product_data][name]"),
            Some("Premium Playlist (50 songs)")
        );
        assert_eq!(get("metadata[quizId]"), Some("q1"));
        assert_eq!(get("metadata[userId]"), Some("u1"));
        assert_eq!(get("metadata[premium]"), Some("true"));
    }

    #[tokio::test]
    async fn test_missing_key_is_misconfigured() {
        let mut config = ServerConfig::for_tests(PathBuf::from("./data")).payment;
        config.secret_key = None;
        let checkout = StripeCheckout::new(config).unwrap();

        let err = checkout
            .create_session(&CheckoutRequest::for_quiz("https://app.test", "q1", "u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_session_url_returned() {
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(
                |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer sk_test_secret");
                    if !authorized {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    let quiz_id = form.get("metadata[quizId]").cloned().unwrap_or_default();
                    (
                        StatusCode::OK,
                        Json(json!({"id": "cs_1", "url": format!("https://pay.test/{}", quiz_id)})),
                    )
                },
            ),
        );

        let url = checkout_against(router)
            .await
            .create_session(&request())
            .await
            .unwrap();
        assert_eq!(url, "https://pay.test/q1");
    }

    #[tokio::test]
    async fn test_provider_rejection_is_payment_error() {
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(|| async {
                (
                    StatusCode::PAYMENT_REQUIRED,
                    Json(json!({"error": {"message": "card declined"}})),
                )
            }),
        );

        let err = checkout_against(router)
            .await
            .create_session(&request())
            .await
            .unwrap_err();
        match err {
            AppError::Payment(msg) => assert!(msg.contains("402")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_without_url_is_payment_error() {
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(|| async { Json(json!({"id": "cs_1", "url": null})) }),
        );

        let err = checkout_against(router)
            .await
            .create_session(&request())
            .await
            .unwrap_err();
        match err {
            AppError::Payment(msg) => assert_eq!(msg, "checkout session has no URL"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_session_is_payment_error() {
        let router = Router::new().route(
            "/v1/checkout/sessions",
            post(|| async { "not json" }),
        );

        let err = checkout_against(router)
            .await
            .create_session(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));
    }
}
