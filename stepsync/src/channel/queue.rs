use std::collections::VecDeque;

use crate::protocol::Message;

/// Inbound messages in arrival order, held until the next reconciliation
/// pass.
#[derive(Clone, Debug, Default)]
pub struct MessageQueue {
    messages: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    /// Takes the most recent message and discards everything before it.
    /// Every message carries complete state, so superseded ones are never
    /// applied individually.
    pub fn drain_latest(&mut self) -> Option<Message> {
        let latest = self.messages.pop_back();
        self.messages.clear();
        latest
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PageState, PanelState};

    fn snapshot(value: i32) -> Message {
        Message::sync(PageState::from([(0, PanelState::from([(0, value)]))]))
    }

    #[test]
    fn drain_latest_keeps_only_the_last_message() {
        let mut queue = MessageQueue::new();
        queue.push(snapshot(1));
        queue.push(Message::update(PageState::new()));
        queue.push(snapshot(3));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.drain_latest(), Some(snapshot(3)));
        assert!(queue.is_empty());
        assert_eq!(queue.drain_latest(), None);
    }

    #[test]
    fn preserves_arrival_order() {
        let mut queue = MessageQueue::new();
        for value in 0..4 {
            queue.push(snapshot(value));
        }

        let values: Vec<i32> =
            queue.iter().map(|message| message.content().get(0, 0)).collect();
        assert_eq!(values, vec![0, 1, 2, 3]);
    }
}
