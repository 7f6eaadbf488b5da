use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{EmbeddingError, GenerationError, StoreError};
use crate::models::{ChunkRecord, HistoryTurn};

/// Which side of an asymmetric embedding model a text is destined for.
/// Indexed documents and search queries need distinct provider task hints;
/// mixing them degrades retrieval silently instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. Every call is a fresh provider request; failures are
    /// not retried here.
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist every record as one batch and return how many the store
    /// reports written. Empty input is a no-op returning 0.
    async fn insert_many(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError>;

    /// Up to `limit` records ranked most-similar-first by the store's own
    /// approximate index. Tie order is store-internal and not stable.
    async fn vector_search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, StoreError>;

    /// Total records stored, across all filenames.
    async fn count_documents(&self) -> Result<u64, StoreError>;

    /// Remove every record whose filename matches exactly (case-sensitive);
    /// returns how many were removed, 0 if none matched.
    async fn delete_by_filename(&self, filename: &str) -> Result<u64, StoreError>;
}

/// One fragment of streamed model output. `thought` marks intermediate
/// reasoning the model exposes ahead of its answer text.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub thought: bool,
    pub text: String,
}

pub type FragmentStream = BoxStream<'static, Result<Fragment, GenerationError>>;

#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Open a streaming generation call. `turns` is the conversation
    /// oldest-first with the current question as the final user turn; the
    /// system instruction travels outside the conversation itself.
    async fn stream_generate(
        &self,
        system_instruction: &str,
        turns: &[HistoryTurn],
    ) -> Result<FragmentStream, GenerationError>;
}
