use futures::{Stream, StreamExt};
use tracing::{debug, error};

use crate::error::ChatError;
use crate::events::ChatEvent;
use crate::models::{ChunkRecord, HistoryTurn, TurnRole};
use crate::traits::{DocumentStore, Embedder, EmbeddingTask, GenerationModel};

/// Persona instruction prepended to every generation call. The retrieved
/// context is appended to it per call; neither ever enters the conversation
/// history itself.
const SYSTEM_PROMPT: &str = "You are a document assistant. Your primary source of truth is the provided 'Context'.\n\
- If the answer is in the context, use it to respond accurately.\n\
- If the context does not contain the answer, you may fall back on general knowledge, but say so.\n\
- Be concise but thorough.";

/// Stands in for the context when retrieval matches nothing. An empty
/// result set is valid input to generation, not a failure.
const EMPTY_CONTEXT: &str = "No relevant context found in the documents.";

/// Turns one question plus caller-supplied history into an ordered stream
/// of chat events: one sources event, then reasoning and answer fragments
/// as the model produces them.
pub struct ChatOrchestrator<E, S, G> {
    embedder: E,
    store: S,
    model: G,
    search_limit: usize,
}

impl<E, S, G> ChatOrchestrator<E, S, G>
where
    E: Embedder,
    S: DocumentStore,
    G: GenerationModel,
{
    pub fn new(embedder: E, store: S, model: G, search_limit: usize) -> Self {
        Self {
            embedder,
            store,
            model,
            search_limit,
        }
    }

    /// Retrieve context for `question` and open the event stream.
    ///
    /// Embedding or retrieval failures surface here, before any event is
    /// emitted. Once the stream has started, a generation failure ends it
    /// with a terminal [`ChatEvent::Error`]; events already emitted stand.
    pub async fn stream<'a>(
        &'a self,
        question: &str,
        history: &[HistoryTurn],
    ) -> Result<impl Stream<Item = ChatEvent> + Send + 'a, ChatError> {
        let query_vector = self.embedder.embed(question, EmbeddingTask::Query).await?;
        let records = self
            .store
            .vector_search(&query_vector, self.search_limit)
            .await?;

        let (context, sources) = build_context(&records);
        debug!(retrieved = records.len(), sources = sources.len(), "context assembled");

        let system_instruction = format!("{SYSTEM_PROMPT}\n\nContext:\n{context}");
        let turns = conversation_turns(question, history);

        Ok(async_stream::stream! {
            yield ChatEvent::Sources(sources);

            let mut fragments = match self.model.stream_generate(&system_instruction, &turns).await {
                Ok(fragments) => fragments,
                Err(err) => {
                    error!(error = %err, "generation failed to start");
                    yield ChatEvent::Error(err.to_string());
                    return;
                }
            };

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) if fragment.text.is_empty() => {}
                    Ok(fragment) if fragment.thought => yield ChatEvent::Reasoning(fragment.text),
                    Ok(fragment) => yield ChatEvent::Answer(fragment.text),
                    Err(err) => {
                        error!(error = %err, "generation stream failed");
                        yield ChatEvent::Error(err.to_string());
                        break;
                    }
                }
            }
        })
    }
}

/// Concatenate retrieved chunk texts in store order, and collect their
/// distinct filenames in first-seen order so the sources event is
/// reproducible.
fn build_context(records: &[ChunkRecord]) -> (String, Vec<String>) {
    if records.is_empty() {
        return (EMPTY_CONTEXT.to_string(), Vec::new());
    }

    let context = records
        .iter()
        .map(|record| record.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut sources: Vec<String> = Vec::new();
    for record in records {
        if !sources.iter().any(|source| source == &record.filename) {
            sources.push(record.filename.clone());
        }
    }

    (context, sources)
}

fn conversation_turns(question: &str, history: &[HistoryTurn]) -> Vec<HistoryTurn> {
    let mut turns = history.to_vec();
    turns.push(HistoryTurn {
        role: TurnRole::User,
        parts: vec![question.to_string()],
    });
    turns
}
