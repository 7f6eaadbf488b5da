use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use pdf_chat_core::{
    discover_pdf_files, ChatOrchestrator, DocumentStore, GeminiProvider, HistoryTurn,
    IngestionPipeline, LopdfExtractor, QdrantDocumentStore,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Collection holding the chunk records
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "documents")]
    collection: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: String,

    /// Embedding model id
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-004")]
    embedding_model: String,

    /// Generation model id
    #[arg(long, env = "CHAT_MODEL", default_value = "gemini-2.0-flash")]
    chat_model: String,

    /// Dimensionality the collection is provisioned for
    #[arg(long, default_value = "768")]
    embedding_dimensions: usize,

    /// Page ceiling per ingested PDF
    #[arg(long, default_value = "20")]
    max_pages: usize,

    /// How many chunks to retrieve as context per question
    #[arg(long, default_value = "5")]
    search_limit: usize,

    /// Candidate pool the store considers per search
    #[arg(long, default_value = "50")]
    search_candidates: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a single PDF, or every PDF under a folder recursively.
    Ingest {
        #[arg(long)]
        path: PathBuf,
    },
    /// Ask a question over the ingested documents; events stream to stdout
    /// as SSE frames.
    Ask {
        #[arg(long)]
        question: String,
        /// Prior turns as JSON: [{"role":"user","parts":["hi"]}, ...]
        #[arg(long)]
        history: Option<String>,
    },
    /// Print the number of stored chunk records.
    Count,
    /// Delete every record ingested from the given filename.
    Delete {
        #[arg(long)]
        filename: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = QdrantDocumentStore::connect(
        &cli.qdrant_url,
        &cli.collection,
        cli.embedding_dimensions,
        cli.search_candidates,
    )
    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    let provider = GeminiProvider::new(&cli.gemini_api_key, &cli.embedding_model, &cli.chat_model);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match cli.command {
        Command::Ingest { path } => {
            store
                .ensure_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let pipeline =
                IngestionPipeline::new(LopdfExtractor::new(cli.max_pages), provider, store);

            if path.is_dir() {
                let files = discover_pdf_files(&path);
                if files.is_empty() {
                    println!("no pdf files under {}", path.display());
                    return Ok(());
                }

                let mut total = 0usize;
                for file in files {
                    match pipeline.ingest_file(&file).await {
                        Ok(stored) => {
                            total += stored;
                            println!("{}: {stored} chunks stored", file.display());
                        }
                        Err(error) => {
                            warn!(path = %file.display(), reason = %error, "skipped pdf");
                        }
                    }
                }
                println!("{total} chunks stored at {}", Utc::now().to_rfc3339());
            } else {
                let stored = pipeline
                    .ingest_file(&path)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                println!("{stored} chunks stored");
            }
        }
        Command::Ask { question, history } => {
            let history: Vec<HistoryTurn> = match history {
                Some(raw) => serde_json::from_str(&raw)
                    .context("history must be a JSON list of role-tagged turns")?,
                None => Vec::new(),
            };

            let orchestrator =
                ChatOrchestrator::new(provider.clone(), store, provider, cli.search_limit);
            let stream = orchestrator
                .stream(&question, &history)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            futures::pin_mut!(stream);
            while let Some(event) = stream.next().await {
                print!("{}", event.sse_frame()?);
            }
        }
        Command::Count => {
            let total = store
                .count_documents()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{total} chunk records stored");
        }
        Command::Delete { filename } => {
            let deleted = store
                .delete_by_filename(&filename)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{deleted} chunk records deleted for {filename}");
        }
    }

    Ok(())
}
