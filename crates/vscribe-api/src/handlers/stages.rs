//! Stage triggers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::info;

use vscribe_models::{JobId, StageName, Stem};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct EnqueueResponse {
    pub job_handle: JobId,
    pub stage: StageName,
    pub stem: Stem,
}

/// POST /api/stages/:stage/:stem
///
/// Missing inputs are reported here rather than as a failed job.
pub async fn enqueue_stage(
    State(state): State<AppState>,
    Path((stage, stem)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<EnqueueResponse>)> {
    let stage: StageName = stage.parse()?;
    let stem = Stem::parse(stem)?;

    for kind in stage.inputs() {
        if !state.store.exists(*kind, &stem).await? {
            return Err(ApiError::source_not_found(format!(
                "no {kind} for stem {stem}"
            )));
        }
    }

    let job_handle = state.queue.enqueue(stage, stem.clone()).await?;
    metrics::record_job_enqueued(stage.as_str());
    info!(job_id = %job_handle, stage = %stage, stem = %stem, "Stage enqueued");

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_handle,
            stage,
            stem,
        }),
    ))
}
