//! Partial transcripts waiting for a turn boundary.

use crate::message::ChatMessage;

/// Pending user and assistant text between turn boundaries.
///
/// The first assistant token that arrives while user text is pending commits
/// the user text first, so a reply never precedes what it answers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TranscriptAccumulator {
    user: String,
    assistant: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_user(&self) -> &str {
        &self.user
    }

    pub fn pending_assistant(&self) -> &str {
        &self.assistant
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.assistant.is_empty()
    }

    pub fn push_user(&mut self, text: &str) {
        self.user.push_str(text);
    }

    /// Appends assistant text, returning the user message this token commits.
    pub fn push_assistant(&mut self, text: &str) -> Option<ChatMessage> {
        let committed = if self.assistant.is_empty() {
            self.take_user()
        } else {
            None
        };
        self.assistant.push_str(text);
        committed
    }

    /// Flushes both buffers at a turn boundary, user first.
    pub fn commit(&mut self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        messages.extend(self.take_user());
        messages.extend(self.take_assistant());
        messages
    }

    /// Drops pending user text, e.g. after a typed message replaced it.
    pub fn clear_user(&mut self) {
        self.user.clear();
    }

    pub fn clear(&mut self) {
        self.user.clear();
        self.assistant.clear();
    }

    fn take_user(&mut self) -> Option<ChatMessage> {
        take_text(&mut self.user).map(ChatMessage::user)
    }

    fn take_assistant(&mut self) -> Option<ChatMessage> {
        take_text(&mut self.assistant).map(ChatMessage::assistant)
    }
}

/// Empties `buffer`; whitespace-only text yields no message.
fn take_text(buffer: &mut String) -> Option<String> {
    let text = std::mem::take(buffer);
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
