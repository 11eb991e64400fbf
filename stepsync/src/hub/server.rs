use std::io::{BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;

use super::HubError;
use super::client::{ClientId, TcpClient};
use super::relay::{Hub, HubMailbox};
use crate::config::HubConfig;
use crate::prelude::*;
use crate::protocol::{self, Message};
use crate::transport::{FrameReader, TransportError};

const ACCEPT_POLL: Duration = Duration::from_millis(25);

pub struct HubServer;

impl HubServer {
    /// Binds the listener and starts accepting on a background thread.
    pub fn start(config: &HubConfig) -> Result<HubHandle, HubError> {
        let listener =
            TcpListener::bind(&config.listen_addr).map_err(|source| {
                HubError::Bind {
                    addr: config.listen_addr.clone(),
                    source,
                }
            })?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let hub = Hub::start();
        let shutdown = Arc::new(AtomicBool::new(false));

        let accept_handle = {
            let mailbox = hub.mailbox();
            let shutdown = shutdown.clone();
            let config = config.clone();
            thread::spawn(move || {
                accept_loop(listener, mailbox, shutdown, &config)
            })
        };

        info!("hub listening on {}", local_addr);

        Ok(HubHandle {
            local_addr,
            hub,
            shutdown,
            accept_handle: Some(accept_handle),
        })
    }
}

pub struct HubHandle {
    local_addr: SocketAddr,
    hub: Hub,
    shutdown: Arc<AtomicBool>,
    accept_handle: Option<JoinHandle<()>>,
}

impl HubHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn clients(&self) -> Result<Vec<ClientId>, HubError> {
        self.hub.clients()
    }

    /// Stops accepting, then closes every client.
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.accept_handle.take() {
            if handle.join().is_err() {
                error!("hub accept thread panicked");
            }
        }

        self.hub.stop();
    }

    /// Blocks until the accept loop exits.
    pub fn wait(&mut self) {
        if let Some(handle) = self.accept_handle.take() {
            if handle.join().is_err() {
                error!("hub accept thread panicked");
            }
        }
    }
}

impl Drop for HubHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(
    listener: TcpListener,
    mailbox: HubMailbox,
    shutdown: Arc<AtomicBool>,
    config: &HubConfig,
) {
    let mut next_id: ClientId = 1;

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let id = next_id;
                next_id += 1;
                debug!("accepted client {} from {}", id, peer);

                if let Err(err) = accept_client(id, stream, &mailbox, config) {
                    warn!("failed to accept client {}: {}", id, err);
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!("hub accept error: {}", err);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    debug!("hub accept loop is exiting");
}

fn accept_client(
    id: ClientId,
    stream: TcpStream,
    mailbox: &HubMailbox,
    config: &HubConfig,
) -> Result<(), HubError> {
    stream.set_nonblocking(false)?;
    let _ = stream.set_nodelay(true);

    let writer =
        TcpClient::new(id, stream.try_clone()?, config.write_timeout())?;
    mailbox.register(Box::new(writer))?;

    let mailbox = mailbox.clone();
    let max_frame_bytes = config.max_frame_bytes;
    thread::spawn(move || {
        run_client_session(id, stream, &mailbox, max_frame_bytes);
        let _ = mailbox.unregister(id);
    });

    Ok(())
}

fn run_client_session(
    id: ClientId,
    stream: TcpStream,
    mailbox: &HubMailbox,
    max_frame_bytes: usize,
) {
    let mut frames = FrameReader::new(BufReader::new(stream), max_frame_bytes);

    loop {
        let frame = match frames.read_next() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("client {} disconnected", id);
                return;
            }
            Err(TransportError::InvalidUtf8) => {
                warn!("skipping non utf-8 frame from client {}", id);
                continue;
            }
            Err(err) => {
                warn!("closing client {}: {}", id, err);
                return;
            }
        };

        match protocol::decode::<Value>(&frame) {
            Ok(message @ Message::Update(_)) => {
                if mailbox.broadcast(message, id).is_err() {
                    return;
                }
            }
            Ok(message) => {
                info!(
                    "ignoring {} message from client {}",
                    message.kind(),
                    id
                );
            }
            Err(err) => {
                warn!("skipping malformed frame from client {}: {}", id, err);
            }
        }
    }
}
