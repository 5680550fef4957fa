use super::types::Message;
use parking_lot::RwLock;
use std::sync::Arc;

/// Ordered, append-only conversation history.
///
/// Cloned handles share the same underlying log; the session is the only
/// writer while a response is in flight, presentation code reads snapshots.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Restore a log from previously persisted messages
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(RwLock::new(messages)),
        }
    }

    pub fn append(&self, message: Message) {
        self.messages.write().push(message);
    }

    /// Replace the content of the message at `index` (user correction).
    ///
    /// Out-of-range edits are ignored; the role is left untouched.
    pub fn edit(&self, index: usize, content: impl Into<String>) {
        if let Some(message) = self.messages.write().get_mut(index) {
            message.content = content.into();
        }
    }

    pub fn reset(&self) {
        self.messages.write().clear();
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
