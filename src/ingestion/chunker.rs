//! Overlapping text chunking with sentence-boundary snapping

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;

/// Text chunker with configurable size and overlap
///
/// `chunk_overlap < chunk_size` is enforced by config validation before a
/// chunker is constructed.
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
    /// Minimum size for a trailing fragment
    min_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_size: 20,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            min_size: config.min_chunk_size,
        }
    }

    /// Split text into overlapping windows, preferring sentence boundaries.
    ///
    /// Consecutive windows share roughly `overlap` characters; the shared
    /// tail is snapped to a sentence or word start so no window begins
    /// mid-word. A trailing fragment below the minimum size is dropped
    /// unless it is the only content.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current_chunk = String::new();

        for sentence in text.split_sentence_bounds() {
            if !current_chunk.is_empty() && current_chunk.len() + sentence.len() > self.chunk_size {
                let overlap_text = self.get_overlap_text(&current_chunk);
                let finished = current_chunk.trim().to_string();
                if !finished.is_empty() {
                    chunks.push(finished);
                }
                current_chunk = overlap_text;
            }

            current_chunk.push_str(sentence);
        }

        let trailing = current_chunk.trim();
        if !trailing.is_empty() && (trailing.len() >= self.min_size || chunks.is_empty()) {
            chunks.push(trailing.to_string());
        }

        chunks
    }

    /// Take the overlap tail of a finished chunk as the start of the next one
    fn get_overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len().saturating_sub(self.overlap);
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let overlap_text = &text[start..];

        // Prefer starting at a sentence boundary, then a word boundary
        if let Some(pos) = overlap_text.find(". ") {
            return overlap_text[pos + 2..].to_string();
        }
        if let Some(pos) = overlap_text.find(' ') {
            return overlap_text[pos + 1..].to_string();
        }

        overlap_text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentences(n: usize) -> String {
        (0..n)
            .map(|i| format!("Sentence number {} carries a bit of content. ", i))
            .collect()
    }

    #[test]
    fn short_text_yields_one_chunk() {
        let chunker = TextChunker::new(1000, 200);
        let chunks = chunker.chunk("The sky is blue.");
        assert_eq!(chunks, vec!["The sky is blue.".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = TextChunker::new(1000, 200);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n  ").is_empty());
    }

    #[test]
    fn long_text_is_split_near_chunk_size() {
        let chunker = TextChunker::new(200, 50);
        let text = sentences(30);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // A chunk may exceed the target by at most one sentence
            assert!(chunk.len() <= 200 + 60, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let chunker = TextChunker::new(200, 50);
        let text = sentences(30);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            // The next chunk starts with text carried from the previous one
            // (boundary snapping can shorten it, never remove it entirely
            // for this regular input)
            let carried: &str = pair[1]
                .split_inclusive(". ")
                .next()
                .unwrap_or(pair[1].as_str());
            assert!(
                pair[0].contains(carried.trim_end()),
                "no shared text between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let chunker = TextChunker::new(200, 0);
        let text = sentences(20);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        // With no overlap every sentence appears exactly once
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(total <= text.len());
    }

    #[test]
    fn all_content_is_covered() {
        let chunker = TextChunker::new(200, 50);
        let text = sentences(30);
        let chunks = chunker.chunk(&text);
        for i in 0..30 {
            let marker = format!("Sentence number {} ", i);
            assert!(
                chunks.iter().any(|c| c.contains(&marker)),
                "sentence {} missing from all chunks",
                i
            );
        }
    }
}
