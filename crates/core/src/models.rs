use serde::{Deserialize, Serialize};

/// One stored page: its extracted text, the embedding it was indexed under,
/// and enough provenance to cite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Originating document name as supplied by the uploader. Not unique
    /// across uploads.
    pub filename: String,
    /// Zero-based page index within the source document. Gaps are expected
    /// where blank pages were skipped.
    pub chunk_id: u32,
    /// Store-assigned identifier; absent until the record is persisted.
    pub id: Option<String>,
}

impl ChunkRecord {
    pub fn new(
        text: impl Into<String>,
        embedding: Vec<f32>,
        filename: impl Into<String>,
        chunk_id: u32,
    ) -> Self {
        Self {
            text: text.into(),
            embedding,
            filename: filename.into(),
            chunk_id,
            id: None,
        }
    }
}

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One prior turn of the conversation, supplied by the caller on every chat
/// call. The pipeline keeps no session state of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub parts: Vec<String>,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![text.into()],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![text.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HistoryTurn, TurnRole};

    #[test]
    fn roles_serialize_lowercase() {
        let turn = HistoryTurn::user("hi");
        let json = serde_json::to_string(&turn).expect("turn should serialize");
        assert_eq!(json, r#"{"role":"user","parts":["hi"]}"#);
    }

    #[test]
    fn history_round_trips() {
        let raw = r#"[{"role":"user","parts":["hi"]},{"role":"model","parts":["hello"]}]"#;
        let turns: Vec<HistoryTurn> = serde_json::from_str(raw).expect("history should parse");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, TurnRole::Model);
        assert_eq!(turns[1].parts, vec!["hello".to_string()]);
    }
}
