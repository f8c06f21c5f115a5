//! Per-sender conversation history
//!
//! In-memory rolling window of message turns keyed by sender phone number.
//! History lives for the lifetime of the process only - it is never written
//! to disk, and a restart starts every conversation fresh.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

/// Global conversation statistics
#[derive(Debug, Clone)]
pub struct ConversationStats {
    pub total_turns: usize,
    pub total_senders: usize,
}

/// Bounded per-sender conversation store
#[derive(Debug)]
pub struct ConversationStore {
    histories: HashMap<String, VecDeque<ConversationTurn>>,
    max_per_sender: usize,
}

impl ConversationStore {
    pub fn new(max_per_sender: usize) -> Self {
        Self {
            histories: HashMap::new(),
            max_per_sender,
        }
    }

    /// Sender's history in chronological order; empty for unknown senders
    pub fn get(&self, sender: &str) -> Vec<ConversationTurn> {
        self.histories
            .get(sender)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, evicting the oldest while over the window bound
    pub fn push(&mut self, sender: &str, role: Role, content: &str) {
        let history = self.histories.entry(sender.to_string()).or_default();
        history.push_back(ConversationTurn::new(role, content));
        while history.len() > self.max_per_sender {
            history.pop_front();
        }
        debug!("History for {} now {} turns", sender, history.len());
    }

    /// Reset a sender's history; idempotent
    pub fn clear(&mut self, sender: &str) {
        self.histories.remove(sender);
        debug!("Cleared history for {}", sender);
    }

    /// Number of turns currently retained for a sender
    pub fn len(&self, sender: &str) -> usize {
        self.histories.get(sender).map_or(0, |h| h.len())
    }

    pub fn is_empty(&self, sender: &str) -> bool {
        self.len(sender) == 0
    }

    pub fn stats(&self) -> ConversationStats {
        ConversationStats {
            total_turns: self.histories.values().map(|h| h.len()).sum(),
            total_senders: self.histories.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut store = ConversationStore::new(20);
        store.push("+1555", Role::User, "Hello, my name is Max");
        store.push("+1555", Role::Assistant, "Nice to meet you, Max!");

        let history = store.get("+1555");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert!(history[0].content.contains("Max"));
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[test]
    fn test_unknown_sender_is_empty() {
        let store = ConversationStore::new(20);
        assert!(store.get("+1999").is_empty());
        assert_eq!(store.len("+1999"), 0);
    }

    #[test]
    fn test_rolling_window_keeps_most_recent() {
        let mut store = ConversationStore::new(5);
        for i in 0..10 {
            store.push("+1555", Role::User, &format!("Message {}", i));
        }

        let history = store.get("+1555");
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].content, "Message 5");
        assert_eq!(history[4].content, "Message 9");
    }

    #[test]
    fn test_bound_formula() {
        // len == min(appended, bound) for every N
        let bound = 4;
        let mut store = ConversationStore::new(bound);
        for n in 1..=10 {
            store.push("+1555", Role::User, &format!("turn {}", n));
            assert_eq!(store.len("+1555"), n.min(bound));
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut store = ConversationStore::new(20);
        store.push("+1555", Role::User, "Test 1");
        store.push("+1555", Role::User, "Test 2");

        store.clear("+1555");
        assert!(store.is_empty("+1555"));
        store.clear("+1555");
        assert!(store.is_empty("+1555"));
    }

    #[test]
    fn test_sender_isolation() {
        let mut store = ConversationStore::new(20);
        store.push("+1111", Role::User, "Chat 1 message");
        store.push("+2222", Role::User, "Chat 2 message");

        assert_eq!(store.len("+1111"), 1);
        assert_eq!(store.len("+2222"), 1);
        assert!(store.get("+1111")[0].content.contains("Chat 1"));

        store.clear("+1111");
        assert_eq!(store.len("+2222"), 1);
    }

    #[test]
    fn test_stats() {
        let mut store = ConversationStore::new(20);
        store.push("+1111", Role::User, "a");
        store.push("+1111", Role::Assistant, "b");
        store.push("+2222", Role::User, "c");

        let stats = store.stats();
        assert_eq!(stats.total_turns, 3);
        assert_eq!(stats.total_senders, 2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let turn = ConversationTurn::new(Role::Assistant, "hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
