/// Configuration management for the Soundtrack server
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub guest_email_failure_is_error: bool,
    pub generator: GeneratorConfig,
    pub payment: PaymentConfig,
    pub rate_limit: RateLimitConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub environment: String,
    /// Public frontend used for playlist links and checkout redirects
    pub frontend_url: String,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token signing secret; login fails as misconfigured without it
    pub jwt_secret: Option<String>,
    pub jwt_expires_in_secs: i64,
    pub otp_ttl_secs: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Playlist generator service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Checkout provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub api_base: String,
    pub price_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub timeout_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth_requests_per_minute: u32,
}

/// Background job thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Minutes after which a `processing` quiz is considered abandoned
    pub stale_quiz_minutes: i64,
    /// Hours after which an unpaid `pending` quiz is failed
    pub pending_quiz_hours: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SMN_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SMN_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let environment =
            env::var("SMN_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let frontend_url = env::var("SMN_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env::var("SMN_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("SMN_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("soundtrack.sqlite"));

        let jwt_secret = env::var("SMN_JWT_SECRET").ok().filter(|s| !s.is_empty());
        let jwt_expires_in_secs = env::var("SMN_JWT_EXPIRES_IN_SECS")
            .unwrap_or_else(|_| "2592000".to_string())
            .parse()
            .unwrap_or(2_592_000);
        let otp_ttl_secs = env::var("SMN_OTP_TTL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .unwrap_or(600);

        let email = if let Ok(smtp_url) = env::var("SMN_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("SMN_EMAIL_FROM_ADDRESS").unwrap_or_else(|_| {
                    "Soundtrack My Night <info@soundtrackmynight.com>".to_string()
                }),
            })
        } else {
            None
        };
        let guest_email_failure_is_error = env::var("SMN_GUEST_EMAIL_FAILURE_IS_ERROR")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let timeout_secs = env::var("SMN_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let generator_endpoint = env::var("SMN_AI_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        let payment_secret_key = env::var("SMN_STRIPE_SECRET_KEY").ok().filter(|s| !s.is_empty());
        let payment_api_base = env::var("SMN_STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string())
            .trim_end_matches('/')
            .to_string();
        let price_cents = env::var("SMN_PREMIUM_PRICE_CENTS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let currency = env::var("SMN_PREMIUM_CURRENCY").unwrap_or_else(|_| "eur".to_string());

        let rate_limit_enabled = env::var("SMN_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let auth_requests_per_minute = env::var("SMN_AUTH_REQUESTS_PER_MINUTE")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let stale_quiz_minutes = env::var("SMN_STALE_QUIZ_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);
        let pending_quiz_hours = env::var("SMN_PENDING_QUIZ_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "soundtrack_server=info,tower_http=info".to_string());

        let log_json = is_json_log_format(env::var("SMN_LOG_FORMAT").ok().as_deref());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                environment,
                frontend_url,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_expires_in_secs,
                otp_ttl_secs,
            },
            email,
            guest_email_failure_is_error,
            generator: GeneratorConfig {
                endpoint: generator_endpoint,
                timeout_secs,
            },
            payment: PaymentConfig {
                secret_key: payment_secret_key,
                api_base: payment_api_base,
                price_cents,
                currency,
                product_name: "Premium Playlist (50 songs)".to_string(),
                timeout_secs,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                auth_requests_per_minute,
            },
            jobs: JobsConfig {
                stale_quiz_minutes,
                pending_quiz_hours,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if let Some(secret) = &self.authentication.jwt_secret {
            if secret.len() < 32 {
                return Err(AppError::Validation(
                    "JWT secret must be at least 32 characters".to_string(),
                ));
            }
        } else {
            tracing::warn!("SMN_JWT_SECRET is not set; logins will fail until it is configured");
        }

        if self.authentication.jwt_expires_in_secs <= 0 || self.authentication.otp_ttl_secs <= 0 {
            return Err(AppError::Validation(
                "Token and OTP lifetimes must be positive".to_string(),
            ));
        }

        if self.payment.price_cents <= 0 {
            return Err(AppError::Validation(
                "Premium price must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether cookies should carry the Secure attribute
    pub fn is_production(&self) -> bool {
        self.service.environment.eq_ignore_ascii_case("production")
    }

    /// Self-contained configuration rooted at `data_directory`, used by tests
    pub fn for_tests(data_directory: PathBuf) -> Self {
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                frontend_url: "http://frontend.test".to_string(),
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                database: data_directory.join("test.sqlite"),
                data_directory,
            },
            authentication: AuthConfig {
                jwt_secret: Some("test-secret-key-for-testing-only-0123456789".to_string()),
                jwt_expires_in_secs: 3600,
                otp_ttl_secs: 600,
            },
            email: None,
            guest_email_failure_is_error: false,
            generator: GeneratorConfig {
                endpoint: "http://generator.test".to_string(),
                timeout_secs: 5,
            },
            payment: PaymentConfig {
                secret_key: Some("sk_test_secret".to_string()),
                api_base: "http://checkout.test".to_string(),
                price_cents: 900,
                currency: "eur".to_string(),
                product_name: "Premium Playlist (50 songs)".to_string(),
                timeout_secs: 5,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                auth_requests_per_minute: 30,
            },
            jobs: JobsConfig {
                stale_quiz_minutes: 15,
                pending_quiz_hours: 24,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

/// `SMN_LOG_FORMAT=json` switches to JSON log lines; anything else is text
fn is_json_log_format(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"))
}
