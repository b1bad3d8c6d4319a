use std::sync::Arc;

use async_trait::async_trait;
use vscribe_ml_client::{Tokenizer, WordCloudRenderer};
use vscribe_models::{ArtifactKind, FrequencyTable, StageName, StageOutput, Stem};
use vscribe_storage::ArtifactStore;

use super::frequency::count_tokens;
use super::{require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

/// transcript text → PNG word cloud
pub struct RenderWordcloud {
    store: ArtifactStore,
    tokenizer: Arc<dyn Tokenizer>,
    renderer: Arc<dyn WordCloudRenderer>,
    width: u32,
    height: u32,
}

impl RenderWordcloud {
    pub fn new(
        store: ArtifactStore,
        tokenizer: Arc<dyn Tokenizer>,
        renderer: Arc<dyn WordCloudRenderer>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            store,
            tokenizer,
            renderer,
            width,
            height,
        }
    }

    /// Reuse a stored frequency table, tokenizing only when there is none.
    async fn frequencies(&self, stem: &Stem) -> StageResult<FrequencyTable> {
        if self.store.exists(ArtifactKind::FrequencyTable, stem).await? {
            return Ok(self.store.read_json(ArtifactKind::FrequencyTable, stem).await?);
        }
        count_tokens(&self.store, self.tokenizer.as_ref(), stem).await
    }
}

#[async_trait]
impl Stage for RenderWordcloud {
    fn name(&self) -> StageName {
        StageName::RenderWordcloud
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::TranscriptText, stem).await?;

        let table = self.frequencies(stem).await?;
        if table.is_empty() {
            return Err(StageError::processing(format!(
                "transcript for {stem} has no tokens to draw"
            )));
        }

        let image = self
            .renderer
            .render(&table, self.width, self.height)
            .await
            .map_err(StageError::collaborator("word-cloud renderer"))?;
        if image.is_empty() {
            return Err(StageError::processing("word-cloud renderer returned an empty image"));
        }

        let location = self
            .store
            .write(ArtifactKind::WordCloudImage, stem, &image)
            .await?;
        self.store.record_wordcloud(&location)?;

        logger.log_progress(&format!(
            "rendered {}x{} word cloud ({} bytes)",
            self.width, self.height, location.size_bytes
        ));
        Ok(StageOutput::new(vec![location]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use vscribe_models::FailureKind;
    use vscribe_storage::Catalog;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn split_tokenizer(times: usize) -> MockTok {
        let mut tokenizer = MockTok::new();
        tokenizer
            .expect_tokenize()
            .times(times)
            .returning(|text| Ok(text.split_whitespace().map(str::to_string).collect()));
        tokenizer
    }

    #[tokio::test]
    async fn renders_and_records_catalog_row() {
        let (_dir, store) = store();
        let catalog = Arc::new(Catalog::in_memory().unwrap());
        let store = store.with_catalog(catalog.clone());
        store
            .write(ArtifactKind::TranscriptText, &stem(), "hello world")
            .await
            .unwrap();

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .withf(|table, w, h| table.get("hello") == 1 && *w == 800 && *h == 400)
            .times(1)
            .returning(|_, _, _| Ok(PNG.to_vec()));

        let stage = RenderWordcloud::new(
            store.clone(),
            Arc::new(split_tokenizer(1)),
            Arc::new(renderer),
            800,
            400,
        );
        stage
            .run(&stem(), &logger(StageName::RenderWordcloud))
            .await
            .unwrap();

        assert_eq!(store.read(ArtifactKind::WordCloudImage, &stem()).await.unwrap(), PNG);
        let row = catalog.get_wordcloud(&stem()).unwrap().unwrap();
        assert_eq!(row.size, PNG.len() as u64);
    }

    #[tokio::test]
    async fn uses_stored_frequency_table() {
        let (_dir, store) = store();
        store
            .write(ArtifactKind::TranscriptText, &stem(), "hello world")
            .await
            .unwrap();
        store
            .write_json(
                ArtifactKind::FrequencyTable,
                &stem(),
                &FrequencyTable::from_tokens(["hello", "world"]),
            )
            .await
            .unwrap();

        let mut renderer = MockRenderer::new();
        renderer.expect_render().returning(|_, _, _| Ok(PNG.to_vec()));

        let stage = RenderWordcloud::new(
            store,
            Arc::new(split_tokenizer(0)),
            Arc::new(renderer),
            800,
            400,
        );
        stage
            .run(&stem(), &logger(StageName::RenderWordcloud))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_image_is_processing_error() {
        let (_dir, store) = store();
        store
            .write(ArtifactKind::TranscriptText, &stem(), "hello")
            .await
            .unwrap();

        let mut renderer = MockRenderer::new();
        renderer.expect_render().returning(|_, _, _| Ok(Vec::new()));

        let stage = RenderWordcloud::new(
            store.clone(),
            Arc::new(split_tokenizer(1)),
            Arc::new(renderer),
            800,
            400,
        );
        let err = stage
            .run(&stem(), &logger(StageName::RenderWordcloud))
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::ProcessingError);
        assert!(!store.exists(ArtifactKind::WordCloudImage, &stem()).await.unwrap());
    }
}
