use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use indexmap::IndexMap;
use serde_json::Value;

use super::HubError;
use super::client::{ClientId, HubClient};
use crate::prelude::*;
use crate::protocol::Message;

enum HubCommand {
    Register(Box<dyn HubClient>),
    Unregister(ClientId),
    Broadcast {
        message: Message<Value>,
        sender: ClientId,
    },
    Clients(Sender<Vec<ClientId>>),
    Stop,
}

/// Cloneable handle for talking to a running [`Hub`] from any thread.
#[derive(Clone)]
pub struct HubMailbox {
    commands: Sender<HubCommand>,
}

impl HubMailbox {
    pub fn register(&self, client: Box<dyn HubClient>) -> Result<(), HubError> {
        self.post(HubCommand::Register(client))
    }

    pub fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.post(HubCommand::Unregister(id))
    }

    pub fn broadcast(
        &self,
        message: Message<Value>,
        sender: ClientId,
    ) -> Result<(), HubError> {
        self.post(HubCommand::Broadcast { message, sender })
    }

    /// Registered client ids in registration order. Because the hub handles
    /// commands in order, this also waits for everything posted before it.
    pub fn clients(&self) -> Result<Vec<ClientId>, HubError> {
        let (tx, rx) = mpsc::channel();
        self.post(HubCommand::Clients(tx))?;
        rx.recv().map_err(|_| HubError::Stopped)
    }

    fn post(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Stopped)
    }
}

/// Actor thread that owns the client set. Every operation is a message, so
/// registration, removal and broadcast never race each other.
pub struct Hub {
    mailbox: HubMailbox,
    thread_handle: Option<JoinHandle<()>>,
}

impl Hub {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || run(rx));

        Self {
            mailbox: HubMailbox { commands: tx },
            thread_handle: Some(handle),
        }
    }

    pub fn mailbox(&self) -> HubMailbox {
        self.mailbox.clone()
    }

    pub fn register(&self, client: Box<dyn HubClient>) -> Result<(), HubError> {
        self.mailbox.register(client)
    }

    pub fn unregister(&self, id: ClientId) -> Result<(), HubError> {
        self.mailbox.unregister(id)
    }

    pub fn broadcast(
        &self,
        message: Message<Value>,
        sender: ClientId,
    ) -> Result<(), HubError> {
        self.mailbox.broadcast(message, sender)
    }

    pub fn clients(&self) -> Result<Vec<ClientId>, HubError> {
        self.mailbox.clients()
    }

    /// Closes every remaining client and joins the hub thread.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        let _ = self.mailbox.post(HubCommand::Stop);
        if handle.join().is_err() {
            error!("hub thread panicked");
        }
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(commands: Receiver<HubCommand>) {
    let mut clients: IndexMap<ClientId, Box<dyn HubClient>> = IndexMap::new();

    while let Ok(command) = commands.recv() {
        match command {
            HubCommand::Register(client) => {
                let id = client.id();
                if let Some(mut previous) = clients.insert(id, client) {
                    warn!(
                        "client {} registered twice; closing the old one",
                        id
                    );
                    previous.close();
                }
                info!("registered client {} ({} connected)", id, clients.len());
            }
            HubCommand::Unregister(id) => {
                if let Some(mut client) = clients.shift_remove(&id) {
                    client.close();
                    info!(
                        "unregistered client {} ({} connected)",
                        id,
                        clients.len()
                    );
                }
            }
            HubCommand::Broadcast { message, sender } => {
                relay(&mut clients, message.into_sync(), sender);
            }
            HubCommand::Clients(reply) => {
                let _ = reply.send(clients.keys().copied().collect());
            }
            HubCommand::Stop => break,
        }
    }

    for (_, mut client) in clients.drain(..) {
        client.close();
    }

    debug!("hub thread is exiting");
}

fn relay(
    clients: &mut IndexMap<ClientId, Box<dyn HubClient>>,
    message: Message<Value>,
    sender: ClientId,
) {
    debug!("relaying update from client {}", sender);

    clients.retain(|&id, client| {
        if id == sender {
            return true;
        }

        match client.send(&message) {
            Ok(()) => true,
            Err(err) => {
                warn!("dropping client {} after failed send: {}", id, err);
                client.close();
                false
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::protocol::MessageKind;
    use crate::transport::TransportError;

    #[derive(Clone, Default)]
    struct MockClient {
        id: ClientId,
        received: Arc<Mutex<Vec<Message<Value>>>>,
        closed: Arc<AtomicBool>,
        failing: Arc<AtomicBool>,
    }

    impl MockClient {
        fn new(id: ClientId) -> Self {
            Self {
                id,
                ..Self::default()
            }
        }

        fn received(&self) -> Vec<Message<Value>> {
            self.received.lock().clone()
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl HubClient for MockClient {
        fn id(&self) -> ClientId {
            self.id
        }

        fn send(&mut self, message: &Message<Value>) -> Result<(), HubError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(TransportError::NotConnected.into());
            }
            self.received.lock().push(message.clone());
            Ok(())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn hub_with(ids: &[ClientId]) -> (Hub, Vec<MockClient>) {
        let hub = Hub::start();
        let clients: Vec<_> =
            ids.iter().map(|&id| MockClient::new(id)).collect();
        for client in &clients {
            hub.register(Box::new(client.clone())).unwrap();
        }
        (hub, clients)
    }

    #[test]
    fn broadcast_reaches_everyone_but_the_sender() {
        let (hub, clients) = hub_with(&[1, 2, 3]);

        hub.broadcast(Message::update(json!({"key": "value"})), 1)
            .unwrap();
        hub.clients().unwrap();

        assert!(clients[0].received().is_empty());
        for client in &clients[1..] {
            let received = client.received();
            assert_eq!(received.len(), 1, "client {}", client.id);
            assert_eq!(received[0].kind(), MessageKind::Sync);
            assert_eq!(received[0].content(), &json!({"key": "value"}));
        }
    }

    #[test]
    fn failing_client_is_closed_and_removed() {
        let (hub, clients) = hub_with(&[1, 2, 3]);
        clients[1].failing.store(true, Ordering::SeqCst);

        hub.broadcast(Message::update(json!({})), 1).unwrap();

        assert_eq!(hub.clients().unwrap(), vec![1, 3]);
        assert!(clients[1].is_closed());
        assert_eq!(clients[2].received().len(), 1);
    }

    #[test]
    fn unregister_closes_the_client() {
        let (hub, clients) = hub_with(&[1, 2]);

        hub.unregister(2).unwrap();
        hub.broadcast(Message::update(json!({})), 1).unwrap();

        assert_eq!(hub.clients().unwrap(), vec![1]);
        assert!(clients[1].is_closed());
        assert!(clients[1].received().is_empty());
    }

    #[test]
    fn stop_closes_remaining_clients() {
        let (mut hub, clients) = hub_with(&[1, 2]);
        let mailbox = hub.mailbox();

        hub.stop();

        assert!(clients.iter().all(MockClient::is_closed));
        assert!(matches!(mailbox.unregister(1), Err(HubError::Stopped)));
    }
}
