pub mod chat;
pub mod error;
pub mod events;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod providers;
pub mod stores;
pub mod traits;

pub use chat::ChatOrchestrator;
pub use error::{
    ChatError, EmbeddingError, FaultClass, GenerationError, IngestError, StoreError,
};
pub use events::ChatEvent;
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, IngestionPipeline};
pub use models::{ChunkRecord, HistoryTurn, TurnRole};
pub use providers::GeminiProvider;
pub use stores::QdrantDocumentStore;
pub use traits::{
    DocumentStore, Embedder, EmbeddingTask, Fragment, FragmentStream, GenerationModel,
};
