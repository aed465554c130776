// src/session/mod.rs — In-memory session store
//
// Per-session history and context share one lock, so same-session operations
// are serialized while different sessions proceed in parallel. The outer map
// only guards entry creation/removal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::provider::{Message, Role};

/// Session id used when the caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Default)]
struct SessionState {
    history: Vec<Message>,
    context: HashMap<String, String>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history: max_history.max(2),
        }
    }

    /// Get or lazily create the entry for a session id.
    fn entry(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(s) = self.sessions.read().unwrap().get(session_id) {
            return s.clone();
        }
        let mut map = self.sessions.write().unwrap();
        map.entry(session_id.to_string())
            .or_insert_with(Default::default)
            .clone()
    }

    /// Snapshot of a session's history, in append order.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        let entry = self.entry(session_id);
        let state = entry.lock().unwrap();
        state.history.clone()
    }

    /// Append a message. Empty role content is a warn-level no-op rather than
    /// an error; callers upstream have already degraded to a fallback reply.
    pub fn append(&self, session_id: &str, message: Message) {
        if message.content.trim().is_empty() && message.tool_calls.is_empty() {
            tracing::warn!(session = session_id, "Ignoring empty message append");
            return;
        }
        let entry = self.entry(session_id);
        let mut state = entry.lock().unwrap();
        state.history.push(message);
        Self::trim(&mut state.history, self.max_history);
    }

    /// Append a batch atomically: either the whole turn (user message, any
    /// tool-call/result pairs, final assistant reply) lands or none of it.
    pub fn append_all(&self, session_id: &str, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        let entry = self.entry(session_id);
        let mut state = entry.lock().unwrap();
        for message in messages {
            if message.content.trim().is_empty() && message.tool_calls.is_empty() {
                tracing::warn!(session = session_id, "Ignoring empty message in batch");
                continue;
            }
            state.history.push(message);
        }
        Self::trim(&mut state.history, self.max_history);
    }

    /// Evict oldest first, preserving order. A leading system message holds
    /// long-lived instructions and is exempt from eviction.
    fn trim(history: &mut Vec<Message>, max: usize) {
        if history.len() <= max {
            return;
        }
        let keep_system = history
            .first()
            .map(|m| m.role == Role::System)
            .unwrap_or(false);
        let excess = history.len() - max;
        let start = usize::from(keep_system);
        history.drain(start..start + excess);
    }

    /// Clear history and context together. The entry itself is removed so the
    /// store does not accumulate empty sessions; the next reference recreates
    /// it lazily.
    pub fn clear(&self, session_id: &str) {
        self.sessions.write().unwrap().remove(session_id);
    }

    pub fn set_context(&self, session_id: &str, key: &str, value: &str) {
        let entry = self.entry(session_id);
        let mut state = entry.lock().unwrap();
        state.context.insert(key.to_string(), value.to_string());
    }

    pub fn get_context(&self, session_id: &str, key: &str) -> Option<String> {
        let entry = self.entry(session_id);
        let state = entry.lock().unwrap();
        state.context.get(key).cloned()
    }

    /// Full context snapshot, used when rendering routine templates.
    pub fn context(&self, session_id: &str) -> HashMap<String, String> {
        let entry = self.entry(session_id);
        let state = entry.lock().unwrap();
        state.context.clone()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> SessionStore {
        SessionStore::new(5)
    }

    #[test]
    fn test_lazy_creation_and_append() {
        let s = store();
        s.append("s1", Message::user("hello"));
        assert_eq!(s.history("s1").len(), 1);
        assert!(s.history("s2").is_empty());
    }

    #[test]
    fn test_empty_append_is_noop() {
        let s = store();
        s.append("s1", Message::user("   "));
        assert!(s.history("s1").is_empty());
    }

    #[test]
    fn test_trim_keeps_most_recent_in_order() {
        let s = store();
        for i in 0..9 {
            s.append("s1", Message::user(format!("m{i}")));
        }
        let h = s.history("s1");
        assert_eq!(h.len(), 5);
        let contents: Vec<&str> = h.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m4", "m5", "m6", "m7", "m8"]);
    }

    #[test]
    fn test_trim_spares_leading_system_message() {
        let s = store();
        s.append("s1", Message::system("persistent instructions"));
        for i in 0..9 {
            s.append("s1", Message::user(format!("m{i}")));
        }
        let h = s.history("s1");
        assert_eq!(h.len(), 5);
        assert_eq!(h[0].role, Role::System);
        assert_eq!(h.last().unwrap().content, "m8");
    }

    #[test]
    fn test_clear_resets_history_and_context() {
        let s = store();
        s.append("s1", Message::user("hi"));
        s.set_context("s1", "registration_code", "200-tigers-u13-2526");
        s.clear("s1");
        assert!(s.history("s1").is_empty());
        assert!(s.get_context("s1", "registration_code").is_none());
    }

    #[test]
    fn test_context_roundtrip() {
        let s = store();
        s.set_context("s1", "routine_id", "3");
        assert_eq!(s.get_context("s1", "routine_id").as_deref(), Some("3"));
        assert!(s.get_context("s1", "missing").is_none());
    }

    #[test]
    fn test_append_all_batch() {
        let s = store();
        s.append_all(
            "s1",
            vec![Message::user("q"), Message::assistant("a")],
        );
        assert_eq!(s.history("s1").len(), 2);
    }

    #[test]
    fn test_clear_removes_the_map_entry() {
        let s = store();
        for i in 0..50 {
            let id = format!("s{i}");
            s.append(&id, Message::user("hi"));
            s.clear(&id);
        }
        assert_eq!(s.sessions.read().unwrap().len(), 0);
    }

    #[test]
    fn test_sessions_are_independent() {
        let s = store();
        s.append("a", Message::user("for a"));
        s.append("b", Message::user("for b"));
        s.clear("a");
        assert!(s.history("a").is_empty());
        assert_eq!(s.history("b").len(), 1);
    }
}
