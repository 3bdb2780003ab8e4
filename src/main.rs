/// Soundtrack server binary
use soundtrack_server::{jobs::JobScheduler, metrics, server, AppContext, AppResult, ServerConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| "soundtrack_server=debug,tower_http=debug".into()),
        )
        .with(
            config
                .logging
                .json
                .then(|| tracing_subscriber::fmt::layer().json()),
        )
        .with((!config.logging.json).then(tracing_subscriber::fmt::layer))
        .init();

    metrics::init_uptime();

    tracing::info!(
        "Starting soundtrack server v{} ({})",
        config.service.version,
        config.service.environment
    );

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
