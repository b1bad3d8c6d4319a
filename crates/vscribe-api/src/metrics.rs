//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vscribe_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vscribe_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vscribe_http_requests_in_flight";

    pub const JOBS_ENQUEUED_TOTAL: &str = "vscribe_jobs_enqueued_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stage job accepted by the queue.
pub fn record_job_enqueued(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

struct PathPatterns {
    single: Regex,
    pair: Regex,
}

fn patterns() -> &'static PathPatterns {
    static PATTERNS: OnceLock<PathPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| PathPatterns {
        single: Regex::new(r"^/api/(videos|audios|wordclouds|jobs)/[^/]+")
            .expect("literal pattern"),
        pair: Regex::new(r"^/api/(stages|artifacts)/([a-z-]+)/[^/]+").expect("literal pattern"),
    })
}

/// Replace stems, ids and job handles with placeholders so label
/// cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let p = patterns();
    let path = p.single.replace(path, "/api/$1/:id");
    let path = p.pair.replace(&path, "/api/$1/$2/:stem");
    path.into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/videos/1700000000000-holiday/file"),
            "/api/videos/:id/file"
        );
        assert_eq!(sanitize_path("/api/videos/42"), "/api/videos/:id");
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000"),
            "/api/jobs/:id"
        );
        assert_eq!(
            sanitize_path("/api/stages/transcribe/1700000000000-holiday"),
            "/api/stages/transcribe/:stem"
        );
        assert_eq!(
            sanitize_path("/api/artifacts/word-cloud-image/abc"),
            "/api/artifacts/word-cloud-image/:stem"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
