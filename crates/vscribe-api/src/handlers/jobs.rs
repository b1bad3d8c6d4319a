//! Job status polling.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use vscribe_models::{JobFailure, JobId, JobRecord, JobState, StageName, StageOutput, Stem};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct JobResponse {
    pub job_handle: JobId,
    pub stage: StageName,
    pub stem: Stem,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<JobRecord> for JobResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            job_handle: record.job_id,
            stage: record.stage,
            stem: record.stem,
            state: record.state,
            result: record.result,
            error: record.error,
            attempts: record.attempts,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// GET /api/jobs/:job_handle
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_handle): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let record = state.queue.status(&JobId::from_string(job_handle)).await?;
    Ok(Json(record.into()))
}
