/// Prometheus metrics
///
/// Collected in the default registry and rendered at `/metrics`:
/// - HTTP request counts and latencies
/// - Login and OTP outcomes
/// - Quiz outcomes and generator latency
/// - Background job runs
use crate::{
    error::{AppError, AppResult},
    quiz::Tier,
};
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram, register_histogram_vec, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, HistogramVec, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, route, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Requests currently in flight
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Login attempts by outcome
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Total number of login attempts",
        &["outcome"]
    )
    .unwrap();

    /// Password-reset code events (issued, verified, invalid, expired, reset)
    pub static ref OTP_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "otp_events_total",
        "Total number of password reset code events",
        &["event"]
    )
    .unwrap();

    // ========== Quiz Metrics ==========

    /// Quiz outcomes by tier and resulting status
    pub static ref QUIZ_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_outcomes_total",
        "Total number of quiz submissions by tier and status",
        &["tier", "status"]
    )
    .unwrap();

    /// Generator call latency in seconds
    pub static ref GENERATOR_DURATION: Histogram = register_histogram!(
        "generator_request_duration_seconds",
        "Playlist generator call latencies in seconds",
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();

    static ref STARTED_AT: Instant = Instant::now();
}

/// Mark process start; later calls are no-ops
pub fn init_uptime() {
    lazy_static::initialize(&STARTED_AT);
}

/// Refresh the uptime gauge
pub fn update_uptime() -> f64 {
    let uptime = STARTED_AT.elapsed().as_secs_f64();
    UPTIME_SECONDS.set(uptime);
    uptime
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> AppResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AppError::Internal(format!("Metrics are not UTF-8: {}", e)))
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a login attempt
pub fn record_login(outcome: &str) {
    LOGIN_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a password-reset code event
pub fn record_otp_event(event: &str) {
    OTP_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record where a quiz ended up
pub fn record_quiz(tier: Tier, status: &str) {
    QUIZ_OUTCOMES_TOTAL
        .with_label_values(&[tier.as_str(), status])
        .inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

/// Request metrics middleware, labelled by matched route so ids stay out of labels
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_ACTIVE.inc();
    let started = Instant::now();
    let response = next.run(request).await;
    HTTP_REQUESTS_ACTIVE.dec();

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        record_login("success");
        record_otp_event("issued");
        record_quiz(Tier::Free, "done");
        record_background_job("quiz_reconciliation", "success", 0.01);

        let text = render_metrics().unwrap();
        assert!(text.contains("login_attempts_total"));
        assert!(text.contains("otp_events_total"));
        assert!(text.contains("quiz_outcomes_total{status=\"done\",tier=\"free\"}"));
        assert!(text.contains("background_jobs_total"));
    }

    #[test]
    fn test_record_http_request() {
        let before = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        record_http_request("GET", "/health", 200, 0.002);
        let after = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        assert!(after > before);
    }
}
