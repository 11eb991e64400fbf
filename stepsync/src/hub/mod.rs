//! Relay hub: fans each client's `update` out to every other client as a
//! `sync`. The hub keeps no page state of its own.

pub mod client;
pub mod relay;
pub mod server;

pub use client::*;
pub use relay::*;
pub use server::*;

use thiserror::Error;

use crate::protocol::ProtocolError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("hub has stopped")]
    Stopped,
}
