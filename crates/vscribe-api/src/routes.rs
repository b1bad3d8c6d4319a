//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    delete_artifact, delete_video, enqueue_stage, get_artifact, get_audio, get_job,
    get_video_file, get_wordcloud, health, list_videos, ready, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, redact_server_errors, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // `:video` is a catalog id on DELETE and a stem on `/file`
    let video_routes = Router::new()
        .route("/videos", post(upload_video).get(list_videos))
        .route("/videos/:video", delete(delete_video))
        .route("/videos/:video/file", get(get_video_file));

    let pipeline_routes = Router::new()
        .route("/stages/:stage/:stem", post(enqueue_stage))
        .route("/jobs/:job_handle", get(get_job));

    let artifact_routes = Router::new()
        .route(
            "/artifacts/:kind/:stem",
            get(get_artifact).delete(delete_artifact),
        )
        .route("/audios/:stem", get(get_audio))
        .route("/wordclouds/:stem", get(get_wordcloud));

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(pipeline_routes)
        .merge(artifact_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured limit instead of axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            redact_server_errors,
        ))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
