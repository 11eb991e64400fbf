//! Byte-level collaborators that move encoded messages between peers.
//!
//! The core only needs [`Transport::send_message`] plus an inbound callback
//! ([`InboundSink`]). Connection management, including reconnecting, belongs
//! to the transport implementation.

pub mod backoff;
pub mod error;
pub mod frame;
pub mod memory;
pub mod tcp;

pub use backoff::*;
pub use error::*;
pub use frame::*;
pub use memory::*;
pub use tcp::*;

/// Receives every inbound payload, in arrival order, from a transport's
/// reader thread.
pub type InboundSink = Box<dyn FnMut(String) + Send + 'static>;

pub trait Transport: Send {
    /// Best effort and order preserving within a single connection. Nothing
    /// is buffered for delivery after a reconnect.
    fn send_message(&mut self, payload: &str) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_message(&mut self, payload: &str) -> Result<(), TransportError> {
        (**self).send_message(payload)
    }
}
