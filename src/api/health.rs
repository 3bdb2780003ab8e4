/// Health and metrics endpoints
use crate::{context::AppContext, error::AppResult, metrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "healthy" or "unhealthy"
    pub status: String,

    pub version: String,

    pub uptime_seconds: f64,

    pub checks: Vec<ComponentHealth>,
}

/// Health status of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health and metrics routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
}

/// Health check; 503 when the database is unreachable
pub async fn health(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthStatus>) {
    let checks = vec![check_database_detailed(&ctx).await];
    let status = determine_overall_status(&checks);

    let status_code = if status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let health = HealthStatus {
        status,
        version: ctx.config.service.version.clone(),
        uptime_seconds: metrics::update_uptime(),
        checks,
    };

    (status_code, Json(health))
}

/// Prometheus text exposition
async fn metrics_handler() -> AppResult<Response> {
    let body = metrics::render_metrics()?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Ping the database
pub async fn check_database(ctx: &AppContext) -> AppResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

async fn check_database_detailed(ctx: &AppContext) -> ComponentHealth {
    let start = Instant::now();

    match check_database(ctx).await {
        Ok(_) => ComponentHealth {
            name: "database".to_string(),
            status: "healthy".to_string(),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "database health check failed");
            ComponentHealth {
                name: "database".to_string(),
                status: "unhealthy".to_string(),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
                error: Some(e.to_string()),
            }
        }
    }
}

fn determine_overall_status(checks: &[ComponentHealth]) -> String {
    if checks.iter().any(|c| c.status == "unhealthy") {
        "unhealthy".to_string()
    } else {
        "healthy".to_string()
    }
}
