use std::sync::Arc;

use async_trait::async_trait;
use vscribe_ml_client::Tokenizer;
use vscribe_models::{ArtifactKind, FrequencyTable, StageName, StageOutput, Stem};
use vscribe_storage::ArtifactStore;

use super::{input_read, require_input, Stage};
use crate::error::{StageError, StageResult};
use crate::logging::JobLogger;

/// transcript text → token counts
///
/// An existing table is returned as is; the tokenizer runs at most once per
/// stem.
pub struct ComputeFrequency {
    store: ArtifactStore,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ComputeFrequency {
    pub fn new(store: ArtifactStore, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { store, tokenizer }
    }
}

/// Tokenize a transcript into a frequency table.
pub(crate) async fn count_tokens(
    store: &ArtifactStore,
    tokenizer: &dyn Tokenizer,
    stem: &Stem,
) -> StageResult<FrequencyTable> {
    let text = store
        .read_to_string(ArtifactKind::TranscriptText, stem)
        .await
        .map_err(input_read(ArtifactKind::TranscriptText, stem))?;
    let tokens = tokenizer
        .tokenize(&text)
        .await
        .map_err(StageError::collaborator("tokenizer"))?;
    Ok(FrequencyTable::from_tokens(tokens))
}

#[async_trait]
impl Stage for ComputeFrequency {
    fn name(&self) -> StageName {
        StageName::ComputeFrequency
    }

    async fn run(&self, stem: &Stem, logger: &JobLogger) -> StageResult<StageOutput> {
        require_input(&self.store, ArtifactKind::TranscriptText, stem).await?;

        if self.store.exists(ArtifactKind::FrequencyTable, stem).await? {
            logger.log_progress("frequency table already computed");
            let location = self.store.locate(ArtifactKind::FrequencyTable, stem).await?;
            return Ok(StageOutput::new(vec![location]).cached());
        }

        let table = count_tokens(&self.store, self.tokenizer.as_ref(), stem).await?;
        let location = self
            .store
            .write_json(ArtifactKind::FrequencyTable, stem, &table)
            .await?;
        logger.log_progress(&format!("{} distinct tokens", table.len()));
        Ok(StageOutput::new(vec![location]))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use vscribe_models::FailureKind;

    #[tokio::test]
    async fn second_run_reuses_table() {
        let (_dir, store) = store();
        store
            .write(ArtifactKind::TranscriptText, &stem(), "hello world hello")
            .await
            .unwrap();

        let mut tokenizer = MockTok::new();
        tokenizer.expect_tokenize().times(1).returning(|text| {
            Ok(text.split_whitespace().map(str::to_string).collect())
        });

        let stage = ComputeFrequency::new(store.clone(), Arc::new(tokenizer));
        let first = stage
            .run(&stem(), &logger(StageName::ComputeFrequency))
            .await
            .unwrap();
        let second = stage
            .run(&stem(), &logger(StageName::ComputeFrequency))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.artifacts, second.artifacts);

        let table: FrequencyTable = store
            .read_json(ArtifactKind::FrequencyTable, &stem())
            .await
            .unwrap();
        assert_eq!(table.get("hello"), 2);
        assert_eq!(table.get("world"), 1);
    }

    #[tokio::test]
    async fn missing_transcript_is_source_not_found() {
        let (_dir, store) = store();
        let mut tokenizer = MockTok::new();
        tokenizer.expect_tokenize().never();

        let stage = ComputeFrequency::new(store, Arc::new(tokenizer));
        let err = stage
            .run(&stem(), &logger(StageName::ComputeFrequency))
            .await
            .unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::SourceNotFound);
    }
}
