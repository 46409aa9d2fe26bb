//! In-process conversation memory, one ordered turn log per session

use dashmap::DashMap;

use crate::types::ConversationTurn;

/// Concurrent map of session id to its ordered turn history.
///
/// Sessions are created on first use and live until cleared; nothing here
/// survives a restart.
#[derive(Default)]
pub struct SessionMemory {
    sessions: DashMap<String, Vec<ConversationTurn>>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed turn to a session, creating it if needed
    pub fn append(&self, session_id: &str, turn: ConversationTurn) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
    }

    /// Full ordered history for a session; empty for unknown sessions
    pub fn get(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.clone())
            .unwrap_or_default()
    }

    /// Reset one session. Idempotent; clearing an unknown session is a no-op.
    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Reset every session
    pub fn clear_all(&self) {
        self.sessions.clear();
    }

    /// Number of sessions with at least one recorded turn
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceRef;

    fn turn(question: &str, answer: &str) -> ConversationTurn {
        ConversationTurn {
            question: question.to_string(),
            answer: answer.to_string(),
            sources: vec![SourceRef {
                source_id: "doc.txt".to_string(),
                position: 0,
            }],
            asked_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn append_preserves_order() {
        let memory = SessionMemory::new();
        memory.append("s1", turn("first?", "one"));
        memory.append("s1", turn("second?", "two"));

        let history = memory.get("s1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].question, "first?");
        assert_eq!(history[1].question, "second?");
    }

    #[test]
    fn unknown_session_is_empty() {
        let memory = SessionMemory::new();
        assert!(memory.get("nope").is_empty());
    }

    #[test]
    fn sessions_are_isolated() {
        let memory = SessionMemory::new();
        memory.append("a", turn("qa?", "aa"));
        memory.append("b", turn("qb?", "ab"));

        assert_eq!(memory.get("a").len(), 1);
        assert_eq!(memory.get("b").len(), 1);
        assert_eq!(memory.get("a")[0].answer, "aa");
        assert_eq!(memory.session_count(), 2);
    }

    #[test]
    fn clear_is_idempotent() {
        let memory = SessionMemory::new();
        memory.append("s1", turn("q?", "a"));
        memory.clear("s1");
        assert!(memory.get("s1").is_empty());
        memory.clear("s1");
        memory.clear("never-existed");
        assert!(memory.get("s1").is_empty());
    }

    #[test]
    fn clear_all_empties_everything() {
        let memory = SessionMemory::new();
        memory.append("a", turn("q?", "a"));
        memory.append("b", turn("q?", "a"));
        memory.clear_all();
        assert_eq!(memory.session_count(), 0);
        assert!(memory.get("a").is_empty());
    }
}
