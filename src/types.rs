//! Core data types shared across ingestion, indexing, and chat

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File formats accepted for ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Pdf,
    Word,
    Html,
    Csv,
    Spreadsheet,
}

impl FileKind {
    /// Every extension `from_extension` accepts
    pub const SUPPORTED_EXTENSIONS: &'static [&'static str] = &[
        "txt", "md", "text", "pdf", "docx", "html", "htm", "csv", "xlsx", "xls", "ods",
    ];

    /// Map a lowercase file extension to a supported kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "txt" | "md" | "text" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Word),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk of document text ready for embedding and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    /// Identifier of the source document (filename or caller-supplied id)
    pub source_id: String,
    /// 0-based ordinal of this chunk within its source
    pub position: u32,
    pub text: String,
    /// Format-specific metadata (page, sheet, row range)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl DocumentChunk {
    pub fn new(source_id: impl Into<String>, position: u32, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            position,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Reference to the chunk an answer drew from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_id: String,
    pub position: u32,
}

/// One completed question/answer exchange in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub asked_at: DateTime<Utc>,
}

/// A chunk returned from similarity search, with its score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Registry record for an ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub source_id: String,
    pub file_kind: FileKind,
    pub chunk_count: usize,
    pub bytes: usize,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}
