//! Chat message history.

use std::collections::BTreeMap;
use tracing::warn;

use llamachat_local::{ChatMessage, ChatRequest, Role};

/// Keys the request sets itself; `chat_options` may not override them.
const RESERVED_OPTIONS: &[&str] = &["messages", "stream", "temperature", "max_tokens"];

/// Ordered conversation sent with every request.
///
/// The first message is always the system message.
#[derive(Debug, Clone)]
pub struct ChatSession {
    system_message: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(system_message: impl Into<String>) -> Self {
        let system_message = system_message.into();
        Self {
            messages: vec![ChatMessage::system(system_message.clone())],
            system_message,
        }
    }

    /// Forget everything but the system message.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Drop the trailing user message, if the history ends with one.
    pub fn pop_last_user(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(message) if message.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    /// Record the model's answer to the trailing user message.
    ///
    /// A reply with no text, for example one stopped before the first
    /// token, removes the user message instead so roles keep alternating.
    /// Returns whether the exchange was kept.
    pub fn record_reply(&mut self, reply: impl Into<String>) -> bool {
        let reply = reply.into();
        if reply.is_empty() {
            self.pop_last_user();
            false
        } else {
            self.push_assistant(reply);
            true
        }
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Nothing has been said yet; only the system message is present.
    pub fn has_no_turns(&self) -> bool {
        self.messages.len() <= 1
    }

    /// Number of user messages so far.
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Build a streamed request carrying the whole history.
    pub fn request(
        &self,
        temperature: f64,
        max_tokens: u32,
        options: &BTreeMap<String, serde_json::Value>,
    ) -> ChatRequest {
        let options = options
            .iter()
            .filter(|(key, _)| {
                let reserved = RESERVED_OPTIONS.contains(&key.as_str());
                if reserved {
                    warn!("Ignoring chat option '{}': set by llamachat", key);
                }
                !reserved
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        ChatRequest {
            messages: self.messages.clone(),
            temperature,
            max_tokens,
            stream: true,
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_starts_with_system() {
        let session = ChatSession::new("be nice");
        assert_eq!(session.messages(), &[ChatMessage::system("be nice")]);
        assert!(session.has_no_turns());
        assert_eq!(session.turns(), 0);
    }

    #[test]
    fn test_turns_and_reset() {
        let mut session = ChatSession::new("sys");
        session.push_user("hi");
        session.push_assistant("hello");
        session.push_user("how are you?");
        assert_eq!(session.len(), 4);
        assert_eq!(session.turns(), 2);

        session.reset();
        assert_eq!(session.messages(), &[ChatMessage::system("sys")]);
    }

    #[test]
    fn test_pop_last_user_only_pops_user() {
        let mut session = ChatSession::new("sys");
        session.push_user("q");
        session.push_assistant("a");
        assert!(session.pop_last_user().is_none());

        session.push_user("q2");
        assert_eq!(session.pop_last_user(), Some(ChatMessage::user("q2")));
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_request_filters_reserved_options() {
        let mut session = ChatSession::new("sys");
        session.push_user("hi");

        let options = BTreeMap::from([
            ("top_p".to_string(), serde_json::json!(0.9)),
            ("stream".to_string(), serde_json::json!(false)),
        ]);
        let request = session.request(0.3, 64, &options);

        assert!(request.stream);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.options.len(), 1);
        assert!(request.options.contains_key("top_p"));
    }

    #[test]
    fn test_record_reply() {
        let mut session = ChatSession::new("sys");
        session.push_user("q1");
        assert!(session.record_reply("partial answ"));
        assert_eq!(session.messages()[2], ChatMessage::assistant("partial answ"));

        session.push_user("q2");
        assert!(!session.record_reply(""));
        assert_eq!(session.len(), 3);
        assert_eq!(session.turns(), 1);
        assert!(!session.has_no_turns());
    }
}
