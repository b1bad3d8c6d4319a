//! Catalog rows.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Uploaded video as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub id: i64,
    /// Stem of the stored video artifact.
    pub stem: String,
    /// File name given by the uploader.
    pub filename: String,
    pub size: u64,
    pub upload_time: DateTime<Utc>,
}

/// Metadata row for a rendered word cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordCloudRecord {
    pub stem: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}
