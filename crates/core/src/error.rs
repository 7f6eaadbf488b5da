use thiserror::Error;

/// Client-visible classification of a failure. The transport layer maps
/// each class onto a response status family; the pipeline never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The caller sent something unacceptable (unsupported file type).
    InvalidInput,
    /// The document itself was unusable (unparseable, or no extractable text).
    Content,
    /// An upstream dependency (embedding provider, store, generation model) failed.
    UpstreamDependency,
    /// Nothing matched the request. Reserved for lookup-by-filename operations.
    NotFound,
    /// Anything unclassified; logged in full, surfaced generically.
    Internal,
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("{backend} rejected the request: {details}")]
    Rejected { backend: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation model returned {status}: {details}")]
    Provider { status: u16, details: String },

    #[error("malformed generation stream: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a supported document type: {0}")]
    InvalidFileType(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("no extractable text in {0}")]
    EmptyPdf(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Search(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl IngestError {
    pub fn fault_class(&self) -> FaultClass {
        match self {
            Self::InvalidFileType(_) => FaultClass::InvalidInput,
            Self::PdfParse(_) | Self::EmptyPdf(_) => FaultClass::Content,
            Self::Embedding(_) | Self::Store(_) => FaultClass::UpstreamDependency,
            Self::Io(_) => FaultClass::Internal,
        }
    }
}

impl ChatError {
    pub fn fault_class(&self) -> FaultClass {
        FaultClass::UpstreamDependency
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ChatError, EmbeddingError, FaultClass, IngestError};

    #[test]
    fn ingest_failures_map_to_distinct_classes() {
        let invalid = IngestError::InvalidFileType("notes.txt".to_string());
        assert_eq!(invalid.fault_class(), FaultClass::InvalidInput);

        let unparseable = IngestError::PdfParse("bad xref".to_string());
        assert_eq!(unparseable.fault_class(), FaultClass::Content);

        let empty = IngestError::EmptyPdf("scan.pdf".to_string());
        assert_eq!(empty.fault_class(), FaultClass::Content);

        let upstream = IngestError::Embedding(EmbeddingError::Provider {
            status: 429,
            details: "quota".to_string(),
        });
        assert_eq!(upstream.fault_class(), FaultClass::UpstreamDependency);
    }

    #[test]
    fn chat_failures_are_upstream_dependency_faults() {
        let error = ChatError::Embedding(EmbeddingError::MalformedResponse(
            "no values".to_string(),
        ));
        assert_eq!(error.fault_class(), FaultClass::UpstreamDependency);
    }
}
