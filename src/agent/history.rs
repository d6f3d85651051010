//! Bounded conversation history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Default number of turns kept per conversation
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Sliding window over the most recent turns, oldest dropped first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    turns: Vec<Turn>,
    limit: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ChatHistory {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Adopt caller-supplied turns, keeping only the newest `limit` of them
    pub fn from_turns(turns: Vec<Turn>, limit: usize) -> Self {
        let mut history = Self { turns, limit: limit.max(1) };
        history.truncate();
        history
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.truncate();
    }

    /// Append the user question and the assistant answer of one completed cycle
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(answer));
        self.truncate();
    }

    /// The last `n` turns in chronological order
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    fn truncate(&mut self) {
        if self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(history: &ChatHistory) -> Vec<&str> {
        history.turns().iter().map(|t| t.content.as_str()).collect()
    }

    #[test]
    fn test_window_keeps_most_recent_in_order() {
        let mut history = ChatHistory::default();
        for i in 0..8 {
            history.record_exchange(&format!("q{i}"), &format!("a{i}"));
        }

        assert_eq!(history.len(), 10);
        assert_eq!(
            contents(&history),
            vec!["q3", "a3", "q4", "a4", "q5", "a5", "q6", "a6", "q7", "a7"]
        );
        assert_eq!(history.turns()[0].role, Role::User);
        assert_eq!(history.turns()[9].role, Role::Assistant);
    }

    #[test]
    fn test_from_turns_truncates_oldest() {
        let turns = (0..13).map(|i| Turn::user(format!("m{i}"))).collect();
        let history = ChatHistory::from_turns(turns, 10);
        assert_eq!(history.len(), 10);
        assert_eq!(history.turns()[0].content, "m3");
        assert_eq!(history.turns()[9].content, "m12");
    }

    #[test]
    fn test_recent_window() {
        let mut history = ChatHistory::default();
        history.record_exchange("q0", "a0");
        history.record_exchange("q1", "a1");
        history.record_exchange("q2", "a2");

        let recent: Vec<&str> = history.recent(5).iter().map(|t| t.content.as_str()).collect();
        assert_eq!(recent, vec!["a0", "q1", "a1", "q2", "a2"]);
        assert_eq!(history.recent(50).len(), 6);
    }

    #[test]
    fn test_role_serialization() {
        let turn = Turn::assistant("hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn test_clear() {
        let mut history = ChatHistory::default();
        history.push(Turn::user("hi"));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.limit(), DEFAULT_HISTORY_LIMIT);
    }
}
