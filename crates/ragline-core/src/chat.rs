//! Conversation state for chat sessions.
//!
//! A [`ChatSession`] is an ordered message history plus timestamps. It is
//! plain data: the engine that talks to a language model and the store
//! that persists sessions live in the app crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering a transcript into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Documents the conversation is scoped to, by source filename.
    #[serde(default)]
    pub context_documents: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChatSession {
    /// New empty session with a random UUID v4 id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            context_documents: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        let now = Utc::now();
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
            timestamp: now,
            metadata: serde_json::Map::new(),
        });
        self.updated_at = now;
    }

    /// The most recent `max_messages` messages, oldest first.
    pub fn history(&self, max_messages: usize) -> &[ChatMessage] {
        let skip = self.messages.len().saturating_sub(max_messages);
        &self.messages[skip..]
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_message_updates_timestamp() {
        let mut session = ChatSession::new();
        let before = session.updated_at;
        session.add_message(Role::User, "hello");
        assert_eq!(session.messages.len(), 1);
        assert!(session.updated_at >= before);
        assert_eq!(session.updated_at, session.messages[0].timestamp);
    }

    #[test]
    fn test_history_window() {
        let mut session = ChatSession::new();
        for i in 0..5 {
            session.add_message(Role::User, format!("m{}", i));
        }
        let recent: Vec<_> = session.history(2).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(session.history(50).len(), 5);
        assert!(session.history(0).is_empty());
    }

    #[test]
    fn test_clear_history() {
        let mut session = ChatSession::new();
        session.add_message(Role::User, "hello");
        session.add_message(Role::Assistant, "hi");
        let stamped = session.updated_at;
        session.clear_history();
        assert!(session.messages.is_empty());
        assert!(session.updated_at >= stamped);
    }

    #[test]
    fn test_serde_roundtrip_is_exact() {
        let mut session = ChatSession::with_id("abc");
        session.add_message(Role::User, "What is in the report?");
        session.add_message(Role::Assistant, "Quarterly numbers.");
        session.context_documents.push("report.pdf".into());
        let json = serde_json::to_string(&session).unwrap();
        let restored: ChatSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert!(json.contains("\"role\":\"user\""));
    }
}
