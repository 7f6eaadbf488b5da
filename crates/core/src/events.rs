use serde::{Deserialize, Serialize};

/// One event in a chat response stream.
///
/// A stream carries exactly one `Sources` event first, then any interleaving
/// of `Reasoning` and `Answer` fragments in generation order. `Error` is
/// terminal: it appears only when generation fails after the stream has
/// started, and nothing follows it. Events already delivered before an
/// `Error` stand as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatEvent {
    /// Distinct filenames whose chunks ground this answer, in first-seen
    /// retrieval order. Empty when retrieval matched nothing.
    Sources(Vec<String>),
    /// Intermediate reasoning text the model exposes ahead of its answer.
    #[serde(rename = "thought")]
    Reasoning(String),
    /// A fragment of the final answer.
    Answer(String),
    /// Terminal diagnostic for a stream that failed after it began.
    Error(String),
}

impl ChatEvent {
    /// Encode the event as one server-sent-events frame: a `data:` line
    /// holding the JSON object, terminated by a blank line. Clients parse
    /// this framing directly, so it is part of the wire contract.
    pub fn sse_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
