use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::{Transport, TransportError};
use crate::protocol::{self, Message};

/// In-process transport that records every payload it is asked to send.
///
/// Clones share the same log, so a test can keep one handle while the page
/// owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<String>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an unavailable connection: sends fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Decodes the sent log, skipping anything that is not a message.
    pub fn sent_messages<T: DeserializeOwned>(&self) -> Vec<Message<T>> {
        self.sent
            .lock()
            .iter()
            .filter_map(|raw| protocol::decode(raw).ok())
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn send_message(&mut self, payload: &str) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }

        self.sent.lock().push(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_sent_log() {
        let observer = MemoryTransport::new();
        let mut transport = observer.clone();

        transport.send_message("one").unwrap();
        transport.send_message("two").unwrap();

        assert_eq!(observer.sent(), vec!["one", "two"]);
        assert_eq!(observer.take_sent().len(), 2);
        assert!(observer.sent().is_empty());
    }

    #[test]
    fn failing_sends_are_not_recorded() {
        let observer = MemoryTransport::new();
        let mut transport = observer.clone();

        observer.set_failing(true);
        assert!(matches!(
            transport.send_message("lost"),
            Err(TransportError::NotConnected)
        ));

        observer.set_failing(false);
        transport.send_message("kept").unwrap();
        assert_eq!(observer.sent(), vec!["kept"]);
    }
}
