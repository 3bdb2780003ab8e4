use crate::{context::AppContext, metrics};
use std::{sync::Arc, time::Instant};
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::quiz_reconciliation_job(Arc::clone(&self)));
        tokio::spawn(Self::expired_otp_cleanup_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Fail stale quizzes (runs every 5 minutes)
    async fn quiz_reconciliation_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::reconcile_stale_quizzes(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Marked {} stale quizzes as failed", count);
                    }
                    record("quiz_reconciliation", "success", started);
                }
                Err(e) => {
                    error!("Failed to reconcile stale quizzes: {}", e);
                    record("quiz_reconciliation", "error", started);
                }
            }
        }
    }

    /// Reset expired OTP codes (runs every 15 minutes)
    async fn expired_otp_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(900));

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::cleanup_expired_otps(&scheduler.context).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleared {} expired reset codes", count);
                    }
                    record("otp_cleanup", "success", started);
                }
                Err(e) => {
                    error!("Failed to clear expired reset codes: {}", e);
                    record("otp_cleanup", "error", started);
                }
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(300));

        loop {
            interval.tick().await;
            let started = Instant::now();

            match tasks::health_check(&scheduler.context).await {
                Ok(_) => record("health_check", "success", started),
                Err(e) => {
                    error!("Health check failed: {}", e);
                    record("health_check", "error", started);
                }
            }
        }
    }
}

fn record(job: &str, status: &str, started: Instant) {
    metrics::record_background_job(job, status, started.elapsed().as_secs_f64());
}
