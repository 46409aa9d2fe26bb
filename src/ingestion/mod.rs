//! Document ingestion: parsing and chunking

pub mod chunker;
pub mod parser;

pub use chunker::TextChunker;
pub use parser::{FileParser, ParsedDocument, Segment};

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::{DocumentChunk, FileKind};

/// Parse + chunk pipeline turning raw file bytes into indexable chunks
pub struct IngestPipeline {
    chunker: TextChunker,
}

/// Outcome of ingesting one file
pub struct IngestOutput {
    pub file_kind: FileKind,
    pub content_hash: String,
    pub chunks: Vec<DocumentChunk>,
}

impl IngestPipeline {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunker: TextChunker::from_config(config),
        }
    }

    /// Parse a file and split it into chunks tagged with the source id.
    ///
    /// Positions are 0-based and contiguous across all segments of the file.
    pub fn ingest(&self, filename: &str, data: &[u8]) -> Result<IngestOutput> {
        let parsed = FileParser::parse(filename, data)?;

        let mut chunks = Vec::new();
        let mut position = 0u32;

        for segment in &parsed.segments {
            for text in self.chunker.chunk(&segment.text) {
                let mut chunk = DocumentChunk::new(filename, position, text);
                chunk.metadata = segment.metadata.clone();
                chunks.push(chunk);
                position += 1;
            }
        }

        tracing::debug!(
            source = filename,
            kind = %parsed.file_kind,
            chunks = chunks.len(),
            "Ingested document"
        );

        Ok(IngestOutput {
            file_kind: parsed.file_kind,
            content_hash: parsed.content_hash,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(&ChunkingConfig {
            chunk_size: 200,
            chunk_overlap: 50,
            min_chunk_size: 20,
        })
    }

    #[test]
    fn tiny_document_yields_one_chunk_at_position_zero() {
        let output = pipeline().ingest("doc.txt", b"The sky is blue.").unwrap();
        assert_eq!(output.chunks.len(), 1);
        assert_eq!(output.chunks[0].source_id, "doc.txt");
        assert_eq!(output.chunks[0].position, 0);
        assert_eq!(output.chunks[0].text, "The sky is blue.");
    }

    #[test]
    fn positions_are_contiguous_and_zero_based() {
        let text: String = (0..40)
            .map(|i| format!("Sentence number {} carries a bit of content. ", i))
            .collect();
        let output = pipeline().ingest("long.txt", text.as_bytes()).unwrap();
        assert!(output.chunks.len() > 1);
        for (i, chunk) in output.chunks.iter().enumerate() {
            assert_eq!(chunk.position, i as u32);
            assert_eq!(chunk.source_id, "long.txt");
        }
    }

    #[test]
    fn unsupported_extension_propagates() {
        assert!(pipeline().ingest("binary.exe", b"\x00\x01").is_err());
    }
}
