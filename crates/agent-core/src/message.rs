//! Conversation Messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    pub content: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Tool call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = tool_call_id;
        msg
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token, +4 for role overhead
        u32::try_from(self.content.len() / 4)
            .unwrap_or(u32::MAX)
            .saturating_add(4)
    }
}

/// Conversation history with utility methods
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    /// Maximum context length (in estimated tokens)
    #[serde(default = "default_max_context")]
    max_context_tokens: u32,
}

fn default_max_context() -> u32 {
    8192
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            max_context_tokens: default_max_context(),
        }
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Whether the conversation already opens with a system prompt
    pub fn has_system_prompt(&self) -> bool {
        self.messages.first().map(|m| m.role) == Some(Role::System)
    }

    /// Install `prompt` as the leading system message, replacing any previous one
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        if self.has_system_prompt() {
            self.messages[0] = Message::system(prompt);
        } else {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Clear all messages except system prompt
    pub fn clear_history(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }

    /// Estimate total tokens in conversation
    pub fn estimate_tokens(&self) -> u32 {
        self.messages.iter().map(Message::estimate_tokens).sum()
    }

    /// Drop the oldest non-system messages until the estimate fits,
    /// always keeping the latest message.
    pub fn truncate_to_fit(&mut self) {
        while self.estimate_tokens() > self.max_context_tokens && self.messages.len() > 2 {
            match self.messages.iter().position(|m| m.role != Role::System) {
                Some(pos) if pos < self.messages.len() - 1 => {
                    self.messages.remove(pos);
                }
                _ => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Berapa EC ideal untuk selada?");
        assert_eq!(msg.role, Role::User);
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_conversation() {
        let mut conv = Conversation::with_system_prompt("Kamu asisten hidroponik.");
        conv.push(Message::user("Hai"));
        conv.push(Message::assistant("Halo!"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_set_system_prompt_replaces_existing() {
        let mut conv = Conversation::with_system_prompt("old schema");
        conv.push(Message::user("Hai"));
        conv.set_system_prompt("new schema");

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].content, "new schema");

        let mut bare = Conversation::new();
        bare.push(Message::user("Hai"));
        bare.set_system_prompt("prompt");
        assert!(bare.has_system_prompt());
        assert_eq!(bare.len(), 2);
    }

    #[test]
    fn test_clear_history_keeps_system() {
        let mut conv = Conversation::with_system_prompt("sys");
        conv.push(Message::user("a"));
        conv.push(Message::tool("{}", Some("call-1".into())));
        conv.clear_history();

        assert_eq!(conv.len(), 1);
        assert!(conv.has_system_prompt());
    }

    #[test]
    fn test_truncate_keeps_system_and_latest() {
        let mut conv = Conversation {
            messages: Vec::new(),
            max_context_tokens: 20,
        };
        conv.push(Message::system("sys"));
        for i in 0..10 {
            conv.push(Message::user(format!("pertanyaan nomor {i} yang cukup panjang")));
        }
        conv.truncate_to_fit();

        assert!(conv.has_system_prompt());
        assert!(conv.last().unwrap().content.contains("nomor 9"));
        assert!(conv.len() < 11);
    }
}
