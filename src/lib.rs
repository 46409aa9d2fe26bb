//! docqa: document question answering with retrieval-augmented generation
//!
//! Upload documents in common formats, index their content as embedded text
//! chunks, and ask questions answered from that content with source
//! references, across multi-turn conversation sessions.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod ingestion;
pub mod memory;
pub mod providers;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{ConversationTurn, DocumentChunk, FileKind, ScoredChunk, SourceRef};
