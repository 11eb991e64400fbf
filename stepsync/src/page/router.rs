use super::projection::ControlTarget;
use crate::channel::ChannelAdapter;
use crate::prelude::*;
use crate::protocol::Message;
use crate::state::{ControlStore, PageState};
use crate::transport::Transport;

/// Turns a local control edit into a store write plus an outbound update.
///
/// The full next state is sent before it is committed. A failed send is
/// logged and counted but the local edit still stands.
#[derive(Debug, Default)]
pub struct ChangeRouter {
    sent: u64,
    failed: u64,
}

impl ChangeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_control_change<T: Transport>(
        &mut self,
        store: &mut ControlStore,
        adapter: &mut ChannelAdapter<T>,
        target: ControlTarget,
        value: f64,
    ) -> PageState {
        let next = store.next_state(target.panel, target.control, value);

        match adapter.send(&Message::update(next.clone())) {
            Ok(()) => self.sent += 1,
            Err(err) => {
                self.failed += 1;
                debug!(
                    "keeping local change to {:?} after failed send: {}",
                    target, err
                );
            }
        }

        store.commit(next.clone());
        next
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ControlRange, PanelState};
    use crate::transport::MemoryTransport;

    fn store() -> ControlStore {
        ControlStore::new([
            (0, ControlRange::default()),
            (1, ControlRange::default()),
        ])
    }

    #[test]
    fn sends_full_state_and_commits() {
        let transport = MemoryTransport::new();
        let mut adapter = ChannelAdapter::new(transport.clone());
        let mut store = store();
        let mut router = ChangeRouter::new();

        let next = router.on_control_change(
            &mut store,
            &mut adapter,
            ControlTarget::new(0, 0),
            50.0,
        );

        let expected = PageState::from([
            (0, PanelState::from([(0, 50)])),
            (1, PanelState::default()),
        ]);
        assert_eq!(next, expected);
        assert_eq!(store.state(), &expected);
        assert_eq!(
            transport.sent_messages::<PageState>(),
            vec![Message::update(expected)]
        );
        assert_eq!(router.sent(), 1);
    }

    #[test]
    fn keeps_local_change_when_send_fails() {
        let transport = MemoryTransport::new();
        transport.set_failing(true);
        let mut adapter = ChannelAdapter::new(transport.clone());
        let mut store = store();
        let mut router = ChangeRouter::new();

        router.on_control_change(
            &mut store,
            &mut adapter,
            ControlTarget::new(1, 2),
            75.0,
        );

        assert_eq!(store.get(1, 2), 75);
        assert!(transport.sent().is_empty());
        assert_eq!(router.failed(), 1);
    }

    #[test]
    fn sends_clamped_values() {
        let transport = MemoryTransport::new();
        let mut adapter = ChannelAdapter::new(transport.clone());
        let mut store = store();

        ChangeRouter::new().on_control_change(
            &mut store,
            &mut adapter,
            ControlTarget::new(0, 3),
            140.2,
        );

        let sent = transport.sent_messages::<PageState>();
        assert_eq!(sent[0].content().get(0, 3), 100);
    }
}
