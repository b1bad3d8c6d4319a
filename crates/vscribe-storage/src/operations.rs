//! High-level storage operations that touch both the store and the catalog.

use tracing::info;

use vscribe_models::{ArtifactKind, ArtifactLocation, Stem, VideoRecord, WordCloudRecord};

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

/// Result of storing an upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stem: Stem,
    pub location: ArtifactLocation,
    /// Catalog row, when a catalog is attached.
    pub record: Option<VideoRecord>,
}

impl ArtifactStore {
    /// Store an uploaded video under a freshly generated stem.
    pub async fn store_upload(
        &self,
        original_filename: Option<&str>,
        bytes: impl AsRef<[u8]>,
    ) -> StorageResult<StoredUpload> {
        let stem = Stem::generate(original_filename);
        let location = self.write(ArtifactKind::Video, &stem, bytes).await?;

        let record = match self.catalog() {
            Some(catalog) => Some(catalog.insert_video(
                &stem,
                original_filename.unwrap_or(stem.as_str()),
                location.size_bytes,
            )?),
            None => None,
        };

        info!(stem = %stem, size = location.size_bytes, "Stored uploaded video");
        Ok(StoredUpload {
            stem,
            location,
            record,
        })
    }

    /// All catalogued videos.
    pub fn list_videos(&self) -> StorageResult<Vec<VideoRecord>> {
        match self.catalog() {
            Some(catalog) => catalog.list_videos(),
            None => Ok(Vec::new()),
        }
    }

    /// Delete a video by catalog id, removing the stored file too.
    ///
    /// A missing file does not block removal of the row.
    pub async fn delete_video_by_id(&self, id: i64) -> StorageResult<VideoRecord> {
        let catalog = self
            .catalog()
            .ok_or_else(|| StorageError::config_error("no catalog attached"))?;
        let record = catalog
            .get_video(id)?
            .ok_or_else(|| StorageError::not_found(format!("video #{id}")))?;
        let stem = Stem::parse(record.stem.as_str())?;

        match self.delete(ArtifactKind::Video, &stem).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                catalog.delete_video(id)?;
            }
            Err(e) => return Err(e),
        }

        info!(id, stem = %stem, "Deleted video");
        Ok(record)
    }

    /// Record the size of a freshly rendered word cloud.
    pub fn record_wordcloud(&self, location: &ArtifactLocation) -> StorageResult<Option<WordCloudRecord>> {
        let Some(catalog) = self.catalog() else {
            return Ok(None);
        };
        let stem = Stem::parse(location.stem.as_str())?;
        Ok(Some(catalog.upsert_wordcloud(&stem, location.size_bytes)?))
    }
}
