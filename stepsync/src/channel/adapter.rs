use super::queue::MessageQueue;
use crate::prelude::*;
use crate::protocol::{self, Message, ProtocolError};
use crate::state::PageState;
use crate::transport::{Transport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Joins the inbound [`MessageQueue`] with an outbound [`Transport`].
///
/// The adapter never touches page state: it only appends decoded messages
/// and forwards encoded ones.
pub struct ChannelAdapter<T> {
    transport: T,
    queue: MessageQueue,
    dropped: u64,
}

impl<T: Transport> ChannelAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            queue: MessageQueue::new(),
            dropped: 0,
        }
    }

    /// Decodes and enqueues a raw payload. Malformed payloads are logged and
    /// dropped without touching the queue.
    pub fn on_receive(&mut self, raw: &str) -> Result<(), ProtocolError> {
        match protocol::decode::<PageState>(raw) {
            Ok(message) => {
                trace!("queued inbound {} message", message.kind());
                self.queue.push(message);
                Ok(())
            }
            Err(err) => {
                self.dropped += 1;
                warn!("dropping malformed payload: {}; payload: {}", err, raw);
                Err(err)
            }
        }
    }

    pub fn drain_latest(&mut self) -> Option<Message> {
        self.queue.drain_latest()
    }

    /// Fire and forget. Failures are logged and returned; nothing is retried.
    pub fn send(&mut self, message: &Message) -> Result<(), ChannelError> {
        let payload = protocol::encode(message)?;

        self.transport.send_message(&payload).map_err(|err| {
            warn!("failed to send {} message: {}", message.kind(), err);
            ChannelError::from(err)
        })
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Count of inbound payloads rejected as malformed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
