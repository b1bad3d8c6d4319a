//! Raw artifact reads and deletes.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use vscribe_models::{ArtifactKind, Stem};

use crate::error::ApiResult;
use crate::state::AppState;

/// Optional secondary rendition.
#[derive(Debug, Default, Deserialize)]
pub struct ArtifactQuery {
    pub ext: Option<String>,
}

fn content_type_for(kind: ArtifactKind, extension: &str) -> &'static str {
    match extension {
        "txt" => "text/plain; charset=utf-8",
        "json" => "application/json",
        _ => kind.content_type(),
    }
}

/// Read an artifact and wrap it in a response with its content type.
pub(crate) async fn serve_artifact(
    state: &AppState,
    kind: ArtifactKind,
    stem: &Stem,
    extension: Option<&str>,
) -> ApiResult<Response> {
    let (bytes, content_type) = match extension {
        Some(ext) if ext != kind.extension() => (
            state.store.read_variant(kind, stem, ext).await?,
            content_type_for(kind, ext),
        ),
        _ => (state.store.read(kind, stem).await?, kind.content_type()),
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// GET /api/artifacts/:kind/:stem
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((kind, stem)): Path<(String, String)>,
    Query(query): Query<ArtifactQuery>,
) -> ApiResult<Response> {
    let kind: ArtifactKind = kind.parse()?;
    let stem = Stem::parse(stem)?;
    serve_artifact(&state, kind, &stem, query.ext.as_deref()).await
}

/// DELETE /api/artifacts/:kind/:stem
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path((kind, stem)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let kind: ArtifactKind = kind.parse()?;
    let stem = Stem::parse(stem)?;
    state.store.delete(kind, &stem).await?;

    info!(kind = %kind, stem = %stem, "Deleted artifact");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/audios/:stem
pub async fn get_audio(
    State(state): State<AppState>,
    Path(stem): Path<String>,
) -> ApiResult<Response> {
    let stem = Stem::parse(stem)?;
    serve_artifact(&state, ArtifactKind::Audio, &stem, None).await
}

/// GET /api/wordclouds/:stem
pub async fn get_wordcloud(
    State(state): State<AppState>,
    Path(stem): Path<String>,
) -> ApiResult<Response> {
    let stem = Stem::parse(stem)?;
    serve_artifact(&state, ArtifactKind::WordCloudImage, &stem, None).await
}
