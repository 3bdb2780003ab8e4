/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::AdminDashboard,
    config::ServerConfig,
    db,
    error::AppResult,
    generator::{HttpPlaylistGenerator, PlaylistGenerator},
    mailer::Mailer,
    payment::{CheckoutProvider, StripeCheckout},
    playlist::PlaylistStore,
    quiz::QuizService,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub quiz_service: Arc<QuizService>,
    pub playlist_store: PlaylistStore,
    pub dashboard: AdminDashboard,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        let generator: Arc<dyn PlaylistGenerator> =
            Arc::new(HttpPlaylistGenerator::new(&config.generator)?);
        let checkout: Arc<dyn CheckoutProvider> =
            Arc::new(StripeCheckout::new(config.payment.clone())?);

        Self::with_providers(config, generator, checkout).await
    }

    /// Create a context with explicit generator and checkout implementations
    pub async fn with_providers(
        config: ServerConfig,
        generator: Arc<dyn PlaylistGenerator>,
        checkout: Arc<dyn CheckoutProvider>,
    ) -> AppResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let config = Arc::new(config);
        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::warn!("SMN_EMAIL_SMTP_URL is not set; emails will be skipped");
        }

        let account_manager = Arc::new(AccountManager::new(db.clone(), config.clone()));
        let quiz_service = Arc::new(QuizService::new(
            db.clone(),
            account_manager.clone(),
            generator,
            checkout,
            mailer.clone(),
            config.clone(),
        ));

        Ok(Self {
            playlist_store: PlaylistStore::new(db.clone()),
            dashboard: AdminDashboard::new(db.clone()),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            config,
            db,
            account_manager,
            quiz_service,
            mailer,
        })
    }

    /// Base URL the server listens on
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
