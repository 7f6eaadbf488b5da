use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmbeddingError, GenerationError};
use crate::models::HistoryTurn;
use crate::traits::{Embedder, EmbeddingTask, Fragment, FragmentStream, GenerationModel};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini REST API, covering both embedding and streamed
/// generation. Construct one per process; the underlying HTTP client is
/// safe for concurrent reuse.
#[derive(Clone)]
pub struct GeminiProvider {
    http: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    generation_model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        embedding_model: impl Into<String>,
        generation_model: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            generation_model: generation_model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str, verb: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, verb)
    }
}

fn task_hint(task: EmbeddingTask) -> &'static str {
    match task {
        EmbeddingTask::Document => "RETRIEVAL_DOCUMENT",
        EmbeddingTask::Query => "RETRIEVAL_QUERY",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    content: RequestContentRef<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct RequestContentRef<'a> {
    parts: Vec<TextPartRef<'a>>,
}

#[derive(Serialize)]
struct TextPartRef<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<TurnContent>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TurnContent {
    role: &'static str,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

fn content_from_turn(turn: &HistoryTurn) -> TurnContent {
    TurnContent {
        role: turn.role.as_str(),
        parts: turn
            .parts
            .iter()
            .map(|part| TextPart { text: part.clone() })
            .collect(),
    }
}

/// Extract fragments from one SSE line. Non-`data:` lines and frames that
/// do not parse as generation chunks are skipped, not errors.
fn parse_sse_line(line: &str) -> Vec<Fragment> {
    let Some(data) = line.strip_prefix("data: ") else {
        return Vec::new();
    };
    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
        return Vec::new();
    };

    chunk
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| {
            part.text.map(|text| Fragment {
                thought: part.thought,
                text,
            })
        })
        .collect()
}

/// Append incoming bytes to the carry buffer and drain every complete line.
/// SSE frames can split anywhere across network reads, so the unterminated
/// tail stays in `carry` until the next read completes it.
fn drain_frames(carry: &mut String, incoming: &str) -> Vec<Fragment> {
    carry.push_str(incoming);

    let mut fragments = Vec::new();
    while let Some(pos) = carry.find('\n') {
        let line: String = carry.drain(..=pos).collect();
        fragments.extend(parse_sse_line(line.trim_end()));
    }
    fragments
}

#[async_trait]
impl Embedder for GeminiProvider {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .http
            .post(self.endpoint(&self.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&EmbedContentRequest {
                content: RequestContentRef {
                    parts: vec![TextPartRef { text }],
                },
                task_type: task_hint(task),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider { status, details });
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::MalformedResponse(error.to_string()))?;

        if parsed.embedding.values.is_empty() {
            return Err(EmbeddingError::MalformedResponse(
                "embedding has no values".to_string(),
            ));
        }

        debug!(dimension = parsed.embedding.values.len(), "generated embedding");
        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl GenerationModel for GeminiProvider {
    async fn stream_generate(
        &self,
        system_instruction: &str,
        turns: &[HistoryTurn],
    ) -> Result<FragmentStream, GenerationError> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&self.generation_model, "streamGenerateContent")
        );

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: system_instruction.to_string(),
                }],
            },
            contents: turns.iter().map(content_from_turn).collect(),
        };

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let details = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider { status, details });
        }

        let fragments = response
            .bytes_stream()
            .scan(String::new(), |carry, chunk| {
                let out: Vec<Result<Fragment, GenerationError>> = match chunk {
                    Ok(bytes) => drain_frames(carry, &String::from_utf8_lossy(&bytes))
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(error) => vec![Err(GenerationError::Http(error))],
                };
                futures::future::ready(Some(out))
            })
            .flat_map(futures::stream::iter);

        Ok(fragments.boxed())
    }
}
