use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::info;
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::ChunkRecord;
use crate::traits::{DocumentStore, Embedder, EmbeddingTask};

/// Upper bound on in-flight embedding requests within one ingestion call.
const DEFAULT_EMBED_CONCURRENCY: usize = 4;

/// Turns one uploaded document into stored, searchable chunk records:
/// extension gate, page extraction, per-page document-mode embedding, one
/// batch insert. Nothing is persisted until the final step, so a failure
/// anywhere leaves the store untouched.
pub struct IngestionPipeline<X, E, S> {
    extractor: X,
    embedder: E,
    store: S,
    embed_concurrency: usize,
}

impl<X, E, S> IngestionPipeline<X, E, S>
where
    X: PdfExtractor + Send + Sync,
    E: Embedder,
    S: DocumentStore,
{
    pub fn new(extractor: X, embedder: E, store: S) -> Self {
        Self {
            extractor,
            embedder,
            store,
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }

    pub fn with_embed_concurrency(mut self, limit: usize) -> Self {
        self.embed_concurrency = limit.max(1);
        self
    }

    /// Ingest one document payload and return the count of records the
    /// store reports persisted.
    pub async fn ingest(&self, bytes: &[u8], filename: &str) -> Result<usize, IngestError> {
        validate_filename(filename)?;

        let pages = self.extractor.extract(bytes, filename)?;
        let page_count = pages.len();

        // Per-page embedding calls are independent; run them through a
        // bounded pool. `buffered` preserves input order, which keeps
        // chunk ids deterministic across runs.
        let records: Vec<ChunkRecord> = stream::iter(pages)
            .map(|page| async move {
                let embedding = self
                    .embedder
                    .embed(&page.text, EmbeddingTask::Document)
                    .await?;
                Ok::<_, IngestError>(ChunkRecord::new(
                    page.text,
                    embedding,
                    filename,
                    page.index,
                ))
            })
            .buffered(self.embed_concurrency)
            .try_collect()
            .await?;

        let stored = self.store.insert_many(records).await?;
        info!(filename, pages = page_count, stored, "ingestion complete");
        Ok(stored)
    }

    /// Filesystem entry point: the extension gate runs before the file is
    /// read at all.
    pub async fn ingest_file(&self, path: &Path) -> Result<usize, IngestError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::InvalidFileType(path.display().to_string()))?;
        validate_filename(filename)?;

        let bytes = tokio::fs::read(path).await?;
        self.ingest(&bytes, filename).await
    }
}

/// Uploads are gated on the filename before any content is touched.
fn validate_filename(filename: &str) -> Result<(), IngestError> {
    let is_pdf = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Ok(())
    } else {
        Err(IngestError::InvalidFileType(filename.to_string()))
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if validate_filename(&entry.file_name().to_string_lossy()).is_ok() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, validate_filename, IngestionPipeline};
    use crate::error::{EmbeddingError, IngestError, StoreError};
    use crate::extractor::{PageText, PdfExtractor};
    use crate::models::ChunkRecord;
    use crate::traits::{DocumentStore, Embedder, EmbeddingTask};
    use async_trait::async_trait;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: Vec<PageText>,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract(&self, _bytes: &[u8], _filename: &str) -> Result<Vec<PageText>, IngestError> {
            Ok(self.pages.clone())
        }
    }

    #[derive(Default)]
    struct FakeEmbedder {
        calls: AtomicUsize,
        tasks: Mutex<Vec<EmbeddingTask>>,
        stagger: bool,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(
            &self,
            text: &str,
            task: EmbeddingTask,
        ) -> Result<Vec<f32>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.tasks.lock().expect("lock should not be poisoned").push(task);
            if self.stagger {
                // Later pages finish first, so ordering must come from the
                // pipeline rather than completion time.
                let delay = 40u64.saturating_sub(call as u64 * 10);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(vec![text.len() as f32, 0.5, -0.5])
        }
    }

    #[derive(Default)]
    struct FakeStore {
        inserted: Mutex<Vec<ChunkRecord>>,
    }

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn insert_many(&self, records: Vec<ChunkRecord>) -> Result<usize, StoreError> {
            let count = records.len();
            self.inserted
                .lock()
                .expect("lock should not be poisoned")
                .extend(records);
            Ok(count)
        }

        async fn vector_search(
            &self,
            _query_vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<ChunkRecord>, StoreError> {
            Ok(Vec::new())
        }

        async fn count_documents(&self) -> Result<u64, StoreError> {
            Ok(self.inserted.lock().expect("lock should not be poisoned").len() as u64)
        }

        async fn delete_by_filename(&self, _filename: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    fn page(index: u32, text: &str) -> PageText {
        PageText {
            index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn non_pdf_filename_is_rejected_before_any_work() {
        let pipeline = IngestionPipeline::new(
            FakeExtractor { pages: vec![page(0, "text")] },
            FakeEmbedder::default(),
            FakeStore::default(),
        );

        let result = pipeline.ingest(b"irrelevant", "notes.txt").await;

        assert!(matches!(result, Err(IngestError::InvalidFileType(_))));
        assert_eq!(pipeline.embedder.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline
            .store
            .inserted
            .lock()
            .expect("lock should not be poisoned")
            .is_empty());
    }

    #[tokio::test]
    async fn one_record_per_page_with_original_indices() {
        let pipeline = IngestionPipeline::new(
            FakeExtractor { pages: vec![page(0, "first"), page(2, "third")] },
            FakeEmbedder::default(),
            FakeStore::default(),
        );

        let stored = pipeline
            .ingest(b"%PDF-1.4", "report.pdf")
            .await
            .expect("ingestion should succeed");

        assert_eq!(stored, 2);
        let inserted = pipeline
            .store
            .inserted
            .lock()
            .expect("lock should not be poisoned")
            .clone();
        let ids: Vec<u32> = inserted.iter().map(|record| record.chunk_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!(inserted.iter().all(|record| record.filename == "report.pdf"));
        assert!(inserted.iter().all(|record| record.id.is_none()));

        let tasks = pipeline
            .embedder
            .tasks
            .lock()
            .expect("lock should not be poisoned")
            .clone();
        assert!(tasks.iter().all(|task| *task == EmbeddingTask::Document));
    }

    #[tokio::test]
    async fn concurrent_embedding_preserves_page_order() {
        let pages = vec![page(0, "a"), page(1, "bb"), page(3, "ccc"), page(4, "dddd")];
        let pipeline = IngestionPipeline::new(
            FakeExtractor { pages },
            FakeEmbedder { stagger: true, ..FakeEmbedder::default() },
            FakeStore::default(),
        )
        .with_embed_concurrency(4);

        pipeline
            .ingest(b"%PDF-1.4", "ordered.pdf")
            .await
            .expect("ingestion should succeed");

        let ids: Vec<u32> = pipeline
            .store
            .inserted
            .lock()
            .expect("lock should not be poisoned")
            .iter()
            .map(|record| record.chunk_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn ingest_file_gates_on_extension_before_reading() {
        let pipeline = IngestionPipeline::new(
            FakeExtractor { pages: Vec::new() },
            FakeEmbedder::default(),
            FakeStore::default(),
        );

        // The path does not exist; reaching the filesystem would surface an
        // io error instead of the type rejection.
        let result = pipeline
            .ingest_file(std::path::Path::new("/nonexistent/notes.txt"))
            .await;
        assert!(matches!(result, Err(IngestError::InvalidFileType(_))));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("REPORT.PDF").is_ok());
        assert!(validate_filename("notes.txt").is_err());
        assert!(validate_filename("pdf").is_err());
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("skip.txt")).and_then(|mut file| file.write_all(b"plain"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }
}
