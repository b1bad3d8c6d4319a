//! Video upload and catalog handlers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vscribe_models::{ArtifactKind, ArtifactLocation, Stem, VideoRecord};

use crate::error::{ApiError, ApiResult};
use crate::handlers::artifacts::serve_artifact;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub stem: Stem,
    /// Catalog row, absent when no catalog is configured.
    pub video: Option<VideoRecord>,
    pub artifact: ArtifactLocation,
}

/// POST /api/videos
///
/// Stores the first multipart field that carries a file.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        let upload = state.store.store_upload(Some(&filename), &bytes).await?;
        info!(stem = %upload.stem, filename = %filename, "Video uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                stem: upload.stem,
                video: upload.record,
                artifact: upload.location,
            }),
        ));
    }

    Err(ApiError::bad_request("No file field in upload"))
}

/// GET /api/videos
pub async fn list_videos(State(state): State<AppState>) -> ApiResult<Json<Vec<VideoRecord>>> {
    Ok(Json(state.store.list_videos()?))
}

/// DELETE /api/videos/:id
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video): Path<String>,
) -> ApiResult<StatusCode> {
    let id: i64 = video
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid video id: {video}")))?;
    let record = state.store.delete_video_by_id(id).await?;

    info!(id, stem = %record.stem, "Video deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/videos/:stem/file
pub async fn get_video_file(
    State(state): State<AppState>,
    Path(video): Path<String>,
) -> ApiResult<Response> {
    let stem = Stem::parse(video)?;
    serve_artifact(&state, ArtifactKind::Video, &stem, None).await
}
