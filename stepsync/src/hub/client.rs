use std::fmt;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::Value;

use super::HubError;
use crate::protocol::{self, Message};
use crate::transport::write_frame;

pub type ClientId = u64;

/// One connected peer as seen by the hub. Content is relayed opaquely.
pub trait HubClient: Send {
    fn id(&self) -> ClientId;
    fn send(&mut self, message: &Message<Value>) -> Result<(), HubError>;
    fn close(&mut self);
}

/// Write half of an accepted TCP connection.
pub struct TcpClient {
    id: ClientId,
    peer: Option<SocketAddr>,
    stream: TcpStream,
}

impl TcpClient {
    /// Writes that make no progress for `write_timeout` fail, so a peer that
    /// stops reading gets dropped instead of stalling the hub.
    pub fn new(
        id: ClientId,
        stream: TcpStream,
        write_timeout: Duration,
    ) -> std::io::Result<Self> {
        stream.set_write_timeout(Some(write_timeout))?;

        Ok(Self {
            id,
            peer: stream.peer_addr().ok(),
            stream,
        })
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl HubClient for TcpClient {
    fn id(&self) -> ClientId {
        self.id
    }

    fn send(&mut self, message: &Message<Value>) -> Result<(), HubError> {
        let payload = protocol::encode(message)?;
        write_frame(&mut self.stream, &payload)?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpClient")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}
