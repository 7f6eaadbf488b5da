pub mod qdrant;

pub use qdrant::QdrantDocumentStore;
