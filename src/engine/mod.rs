//! Conversational retrieval engine

pub mod prompt;

pub use prompt::PromptBuilder;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::memory::SessionMemory;
use crate::providers::ProviderRegistry;
use crate::types::{ConversationTurn, ScoredChunk, SourceRef};

/// Session used when a chat request names none
pub const DEFAULT_SESSION: &str = "default";

/// An answer with the chunks it drew from
#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieval-augmented chat over the vector index with per-session memory
pub struct ChatEngine {
    index: Arc<VectorIndex>,
    memory: Arc<SessionMemory>,
    registry: Arc<ProviderRegistry>,
    top_k: usize,
    /// One async mutex per active session id; asks for the same session
    /// serialize, distinct sessions proceed concurrently
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        memory: Arc<SessionMemory>,
        registry: Arc<ProviderRegistry>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            memory,
            registry,
            top_k,
            session_locks: DashMap::new(),
        }
    }

    /// Answer a question grounded in indexed content, recording the turn.
    ///
    /// The session lock is held across the history read, generation, and
    /// append, so a session's turn log always reflects complete exchanges in
    /// order. No partial turn is recorded on any failure path.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<ChatAnswer> {
        let lock = Arc::clone(
            &self
                .session_locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        let _guard = lock.lock().await;

        let client = self.registry.active_client()?;

        let results = self
            .index
            .search(question, self.top_k)
            .await
            .map_err(|e| match e {
                Error::Embedding(msg) | Error::Index(msg) => Error::Retrieval(msg),
                other => other,
            })?;

        let context = PromptBuilder::build_context(&results);
        let history = self.memory.get(session_id);
        let prompt = PromptBuilder::render_within_budget(
            &context,
            &history,
            question,
            client.max_input_chars(),
        )?;

        tracing::debug!(
            session = session_id,
            retrieved = results.len(),
            history = history.len(),
            "Generating answer"
        );

        let answer = client.generate(&prompt).await?;
        let sources = collect_sources(&results);

        self.memory.append(
            session_id,
            ConversationTurn {
                question: question.to_string(),
                answer: answer.clone(),
                sources: sources.clone(),
                asked_at: chrono::Utc::now(),
            },
        );

        Ok(ChatAnswer { answer, sources })
    }

    /// Reset a session's history. Idempotent.
    ///
    /// The session's lock entry is kept: an in-flight `ask` may still hold
    /// it, and dropping the entry would let a later `ask` mint a fresh mutex
    /// and run concurrently with the in-flight one.
    pub fn clear(&self, session_id: &str) {
        self.memory.clear(session_id);
    }
}

/// Unique source references in retrieval order
fn collect_sources(results: &[ScoredChunk]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for result in results {
        let source = SourceRef {
            source_id: result.chunk.source_id.clone(),
            position: result.chunk.position,
        };
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    use crate::providers::{EmbeddingProvider, LlmClient};
    use crate::types::DocumentChunk;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            // Bag-of-words over hash buckets, deterministic
            let mut v = vec![0.0f32; 32];
            for word in text.to_lowercase().split_whitespace() {
                let mut h = 5381u64;
                for b in word.bytes() {
                    h = h.wrapping_mul(33).wrapping_add(b as u64);
                }
                v[(h % 32) as usize] += 1.0;
            }
            Ok(v)
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[derive(Debug)]
    struct StubLlm {
        answer: String,
        max_input_chars: usize,
        fail: bool,
        delay: std::time::Duration,
        prompts: SyncMutex<Vec<String>>,
    }

    impl StubLlm {
        fn new(answer: &str, max_input_chars: usize) -> Self {
            Self {
                answer: answer.to_string(),
                max_input_chars,
                fail: false,
                delay: std::time::Duration::ZERO,
                prompts: SyncMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: String::new(),
                max_input_chars: 100_000,
                fail: true,
                delay: std::time::Duration::ZERO,
                prompts: SyncMutex::new(Vec::new()),
            }
        }

        fn slow(answer: &str, delay: std::time::Duration) -> Self {
            Self {
                delay,
                ..Self::new(answer, 100_000)
            }
        }
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::generation("stub failure"));
            }
            Ok(self.answer.clone())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(!self.fail)
        }

        fn max_input_chars(&self) -> usize {
            self.max_input_chars
        }

        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }
    }

    async fn engine_with(llm: Arc<StubLlm>) -> ChatEngine {
        let index = Arc::new(VectorIndex::new(Arc::new(StubEmbedder)));
        index
            .add(vec![DocumentChunk::new("doc.txt", 0, "The sky is blue.")])
            .await
            .unwrap();
        let registry = Arc::new(ProviderRegistry::with_cached_client("stub", llm));
        ChatEngine::new(index, Arc::new(SessionMemory::new()), registry, 4)
    }

    #[tokio::test]
    async fn ask_records_one_turn_with_sources() {
        let llm = Arc::new(StubLlm::new("The sky is blue.", 100_000));
        let engine = engine_with(Arc::clone(&llm)).await;

        let result = engine.ask("default", "What color is the sky?").await.unwrap();
        assert_eq!(result.answer, "The sky is blue.");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].source_id, "doc.txt");
        assert_eq!(result.sources[0].position, 0);

        let history = engine.memory.get("default");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "What color is the sky?");
        assert_eq!(history[0].sources[0].source_id, "doc.txt");
    }

    #[tokio::test]
    async fn clear_then_get_is_empty() {
        let llm = Arc::new(StubLlm::new("answer", 100_000));
        let engine = engine_with(llm).await;

        engine.ask("s1", "question one?").await.unwrap();
        assert_eq!(engine.memory.get("s1").len(), 1);

        engine.clear("s1");
        assert!(engine.memory.get("s1").is_empty());
        // Clearing again is a no-op
        engine.clear("s1");
    }

    #[tokio::test]
    async fn generation_failure_leaves_no_partial_turn() {
        let llm = Arc::new(StubLlm::failing());
        let engine = engine_with(llm).await;

        let err = engine.ask("s1", "will this fail?").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(engine.memory.get("s1").is_empty());
    }

    #[tokio::test]
    async fn context_too_large_leaves_no_partial_turn() {
        let llm = Arc::new(StubLlm::new("answer", 10));
        let engine = engine_with(Arc::clone(&llm)).await;

        let err = engine.ask("s1", "question?").await.unwrap_err();
        assert!(matches!(err, Error::ContextTooLarge(_)));
        assert!(engine.memory.get("s1").is_empty());
        assert!(llm.prompts.lock().is_empty(), "LLM must not be called");
    }

    #[tokio::test]
    async fn no_provider_fails_before_retrieval() {
        let index = Arc::new(VectorIndex::new(Arc::new(StubEmbedder)));
        let engine = ChatEngine::new(
            index,
            Arc::new(SessionMemory::new()),
            Arc::new(ProviderRegistry::empty()),
            4,
        );
        let err = engine.ask("s1", "anyone there?").await.unwrap_err();
        assert!(matches!(err, Error::NoActiveProvider));
    }

    #[tokio::test]
    async fn clear_during_in_flight_ask_keeps_session_serialized() {
        use std::time::Duration;

        let llm = Arc::new(StubLlm::slow("answer", Duration::from_millis(50)));
        let engine = Arc::new(engine_with(llm).await);

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ask("s1", "first question?").await })
        };
        // Let the first ask acquire the session lock and start generating
        tokio::time::sleep(Duration::from_millis(10)).await;

        engine.clear("s1");

        let second = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.ask("s1", "second question?").await })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        // The second ask must have waited for the first; the log holds both
        // completed exchanges in order, never an interleaving
        let history = engine.memory.get("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "first question?");
        assert_eq!(history[1].question, "second question?");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let llm = Arc::new(StubLlm::new("answer", 100_000));
        let engine = engine_with(llm).await;

        engine.ask("alpha", "first question?").await.unwrap();
        engine.ask("beta", "second question?").await.unwrap();

        let alpha = engine.memory.get("alpha");
        let beta = engine.memory.get("beta");
        assert_eq!(alpha.len(), 1);
        assert_eq!(beta.len(), 1);
        assert_eq!(alpha[0].question, "first question?");
        assert_eq!(beta[0].question, "second question?");
    }

    #[tokio::test]
    async fn old_history_is_truncated_from_prompts() {
        // Budget covers the fixed parts plus roughly one recorded turn
        let base = PromptBuilder::render("", &[], "q").chars().count();
        let long_answer = "word ".repeat(60);
        let llm = Arc::new(StubLlm::new(&long_answer, base + 450));
        let engine = engine_with(Arc::clone(&llm)).await;

        engine.ask("s1", "first distinctive question?").await.unwrap();
        engine.ask("s1", "second distinctive question?").await.unwrap();
        engine.ask("s1", "third distinctive question?").await.unwrap();

        // Full history is still recorded even when prompts truncate it
        assert_eq!(engine.memory.get("s1").len(), 3);

        let prompts = llm.prompts.lock();
        let last = prompts.last().unwrap();
        assert!(
            !last.contains("first distinctive question?"),
            "oldest turn should have been dropped from the prompt"
        );
    }
}
