//! Prompt assembly for grounded question answering

use crate::error::{Error, Result};
use crate::types::{ConversationTurn, ScoredChunk};

/// Prompt builder for retrieval-grounded chat
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context section from retrieved chunks
    pub fn build_context(results: &[ScoredChunk]) -> String {
        let mut context = String::new();
        for result in results {
            context.push_str(&format!(
                "[{}, chunk {}]\n{}\n\n---\n\n",
                result.chunk.source_id, result.chunk.position, result.chunk.text
            ));
        }
        context
    }

    /// Render the full prompt: instruction, context, history, question
    pub fn render(context: &str, history: &[ConversationTurn], question: &str) -> String {
        let history_section = if history.is_empty() {
            String::new()
        } else {
            let turns: Vec<String> = history
                .iter()
                .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.answer))
                .collect();
            format!("\nCONVERSATION SO FAR:\n{}\n", turns.join("\n\n"))
        };

        format!(
            r#"You are a document-grounded assistant that ONLY uses information from provided documents.

RULES:
1. ONLY use information that is EXPLICITLY stated in the CONTEXT below
2. If the answer is not in the context, respond with "This information is not available in the provided documents."
3. NEVER use external knowledge or make inferences beyond what is stated
4. Stay close to the source text when paraphrasing

CONTEXT FROM DOCUMENTS:
{context}
{history}
QUESTION: {question}

Provide a grounded answer using ONLY the document content above:"#,
            context = context,
            history = history_section,
            question = question
        )
    }

    /// Render the prompt within a character budget.
    ///
    /// History is dropped whole turns from the oldest end until the prompt
    /// fits. If the instruction, context, and question alone exceed the
    /// budget the call fails; retrieved context is never silently truncated.
    pub fn render_within_budget(
        context: &str,
        history: &[ConversationTurn],
        question: &str,
        max_chars: usize,
    ) -> Result<String> {
        let without_history = Self::render(context, &[], question);
        if without_history.chars().count() > max_chars {
            return Err(Error::ContextTooLarge(format!(
                "prompt needs {} characters without any history, budget is {}",
                without_history.chars().count(),
                max_chars
            )));
        }

        for start in 0..history.len() {
            let prompt = Self::render(context, &history[start..], question);
            if prompt.chars().count() <= max_chars {
                return Ok(prompt);
            }
        }

        Ok(without_history)
    }
}
