//! Message queue and active message tracking
//!
//! The queue of message ids is fetched once per process and walked with a
//! cursor. The cursor only moves forward and saturates at the end, so
//! advancing a finished queue is a no-op.

use crate::backend::MessageContent;

/// Ordered message ids plus a forward-only cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQueue {
    ids: Vec<String>,
    cursor: usize,
}

impl MessageQueue {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Id under the cursor, if any remain
    pub fn current_id(&self) -> Option<&str> {
        self.ids.get(self.cursor).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.ids.len()
    }

    pub fn remaining(&self) -> usize {
        self.ids.len().saturating_sub(self.cursor)
    }

    /// Move to the next message; returns the new current id
    pub fn advance(&mut self) -> Option<&str> {
        if self.cursor < self.ids.len() {
            self.cursor += 1;
        }
        self.current_id()
    }
}

/// Message currently being handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMessage {
    pub id: String,
    pub content: MessageContent,
}

/// Queue plus the loaded message under its cursor
#[derive(Debug, Default)]
pub struct Inbox {
    queue: Option<MessageQueue>,
    active: Option<ActiveMessage>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.queue.is_some()
    }

    /// Install a freshly fetched queue; the cursor starts at the first id
    pub fn load(&mut self, ids: Vec<String>) {
        tracing::info!("Message queue loaded with {} message(s)", ids.len());
        self.queue = Some(MessageQueue::new(ids));
        self.active = None;
    }

    pub fn queue(&self) -> Option<&MessageQueue> {
        self.queue.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.queue.as_ref().and_then(MessageQueue::current_id)
    }

    pub fn is_complete(&self) -> bool {
        self.queue.as_ref().is_some_and(MessageQueue::is_complete)
    }

    /// Record the content fetched for the current id
    pub fn set_active(&mut self, id: String, content: MessageContent) {
        self.active = Some(ActiveMessage { id, content });
    }

    pub fn active(&self) -> Option<&ActiveMessage> {
        self.active.as_ref()
    }

    /// Drop the active message and move the cursor forward
    pub fn advance(&mut self) -> Option<String> {
        self.active = None;
        self.queue
            .as_mut()
            .and_then(|queue| queue.advance().map(str::to_string))
    }

    /// Forget the queue so the next session fetches it again
    pub fn reset(&mut self) {
        self.queue = None;
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn content(subject: &str) -> MessageContent {
        MessageContent {
            subject: subject.to_string(),
            body: "Body".to_string(),
            summary: "Summary".to_string(),
        }
    }

    #[test]
    fn test_queue_walks_forward() {
        let mut queue = MessageQueue::new(ids(&["a", "b"]));
        assert_eq!(queue.current_id(), Some("a"));
        assert_eq!(queue.remaining(), 2);

        assert_eq!(queue.advance(), Some("b"));
        assert_eq!(queue.cursor(), 1);
        assert!(!queue.is_complete());

        assert_eq!(queue.advance(), None);
        assert!(queue.is_complete());
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_advance_at_end_is_idempotent() {
        let mut queue = MessageQueue::new(ids(&["a"]));
        queue.advance();
        queue.advance();
        queue.advance();
        assert_eq!(queue.cursor(), 1);
        assert!(queue.is_complete());
    }

    #[test]
    fn test_empty_queue_is_complete() {
        let queue = MessageQueue::new(Vec::new());
        assert!(queue.is_empty());
        assert!(queue.is_complete());
        assert_eq!(queue.current_id(), None);
    }

    #[test]
    fn test_inbox_starts_unloaded() {
        let inbox = Inbox::new();
        assert!(!inbox.is_loaded());
        assert!(!inbox.is_complete());
        assert_eq!(inbox.current_id(), None);
    }

    #[test]
    fn test_advance_clears_active_message() {
        let mut inbox = Inbox::new();
        inbox.load(ids(&["a", "b"]));
        inbox.set_active("a".to_string(), content("Lunch"));
        assert_eq!(inbox.active().map(|m| m.id.as_str()), Some("a"));

        assert_eq!(inbox.advance().as_deref(), Some("b"));
        assert!(inbox.active().is_none());
        assert_eq!(inbox.current_id(), Some("b"));
    }

    #[test]
    fn test_reset_forgets_queue() {
        let mut inbox = Inbox::new();
        inbox.load(ids(&["a"]));
        inbox.set_active("a".to_string(), content("Lunch"));
        inbox.reset();
        assert!(!inbox.is_loaded());
        assert!(inbox.active().is_none());
    }
}
