//! The controller page: a single-threaded state machine that owns the
//! [`ControlStore`], reacts to clock ticks, local edits and inbound
//! messages, and publishes [`PageProps`] after each pass.

pub mod projection;
pub mod router;
pub mod runtime;

pub use projection::*;
pub use router::ChangeRouter;
pub use runtime::PageRuntime;

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::channel::ChannelAdapter;
use crate::config::PageConfig;
use crate::prelude::*;
use crate::sequence::StepIndexer;
use crate::state::{ControlStore, PageState};
use crate::transport::Transport;

#[derive(Clone, Debug, PartialEq)]
pub enum PageCommand {
    Tick(u64),
    ControlChange { target: ControlTarget, value: f64 },
    /// Raw payload from the transport.
    Inbound(String),
    ResetClock,
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PageEvent {
    Rendered(PageProps),
    Stopped,
}

pub type PageCommandSender = Sender<PageCommand>;
pub type PageCommandReceiver = Receiver<PageCommand>;
pub type PageEventSender = Sender<PageEvent>;

pub fn command_channel() -> (PageCommandSender, PageCommandReceiver) {
    mpsc::channel()
}

/// All mutation happens on whichever thread drives the page, one command at
/// a time. Commands that arrive together are applied as a batch and followed
/// by a single reconcile and render.
pub struct Page<T> {
    store: ControlStore,
    steps: StepIndexer,
    tick: u64,
    adapter: ChannelAdapter<T>,
    router: ChangeRouter,
    projector: Projector,
    inbox: PageCommandReceiver,
    inbox_tx: PageCommandSender,
    events: Option<PageEventSender>,
    dirty: bool,
    quit: bool,
}

impl<T: Transport> Page<T> {
    pub fn new(config: &PageConfig, transport: T) -> Self {
        let (tx, rx) = command_channel();
        Self::with_channel(config, transport, tx, rx)
    }

    /// Builds a page around an existing command channel, for callers that
    /// must hand out senders (to a transport sink or a clock) before the
    /// page exists.
    pub fn with_channel(
        config: &PageConfig,
        transport: T,
        inbox_tx: PageCommandSender,
        inbox: PageCommandReceiver,
    ) -> Self {
        Self {
            store: ControlStore::new(config.layout()),
            steps: StepIndexer::new(config.sequencer.count),
            tick: 0,
            adapter: ChannelAdapter::new(transport),
            router: ChangeRouter::new(),
            projector: Projector::new(config, inbox_tx.clone()),
            inbox,
            inbox_tx,
            events: None,
            dirty: true,
            quit: false,
        }
    }

    pub fn with_events(mut self, events: PageEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn command_sender(&self) -> PageCommandSender {
        self.inbox_tx.clone()
    }

    pub fn handle(&mut self, command: PageCommand) {
        match command {
            PageCommand::Tick(tick) => self.on_tick(tick),
            PageCommand::ControlChange { target, value } => {
                self.on_control_change(target, value);
            }
            PageCommand::Inbound(raw) => self.receive(&raw),
            PageCommand::ResetClock => self.reset_clock(),
            PageCommand::Quit => {
                debug!("page received quit");
                self.quit = true;
            }
        }
    }

    pub fn on_tick(&mut self, tick: u64) {
        self.tick = tick;
        let previous = self.steps.current();
        if self.steps.update(tick) != previous {
            self.dirty = true;
        }
    }

    pub fn reset_clock(&mut self) {
        self.tick = 0;
        self.steps.reset();
        self.dirty = true;
    }

    pub fn on_control_change(
        &mut self,
        target: ControlTarget,
        value: f64,
    ) -> PageState {
        self.dirty = true;
        self.router.on_control_change(
            &mut self.store,
            &mut self.adapter,
            target,
            value,
        )
    }

    /// Queues an inbound payload for the next reconcile. Malformed payloads
    /// are dropped.
    pub fn receive(&mut self, raw: &str) {
        let _ = self.adapter.on_receive(raw);
    }

    /// Applies the most recent queued message, discarding the rest.
    /// Returns whether a message was applied.
    pub fn reconcile(&mut self) -> bool {
        let Some(message) = self.adapter.drain_latest() else {
            return false;
        };

        trace!("applying inbound {} message", message.kind());
        self.store.replace(message.into_content());
        self.dirty = true;
        true
    }

    /// Runs one non-blocking pass over whatever is waiting in the inbox.
    /// Returns whether the page rendered.
    pub fn process(&mut self) -> bool {
        self.drain_inbox();
        self.finish_pass()
    }

    /// Blocks on the inbox until [`PageCommand::Quit`].
    pub fn run(&mut self) {
        debug!("page loop started");
        self.finish_pass();

        while !self.quit {
            let Ok(command) = self.inbox.recv() else {
                break;
            };
            self.handle(command);
            self.drain_inbox();
            self.finish_pass();
        }

        self.publish(PageEvent::Stopped);
        debug!("page loop stopped");
    }

    pub fn props(&mut self) -> PageProps {
        self.projector
            .project(self.store.state(), self.steps.current())
    }

    pub fn store(&self) -> &ControlStore {
        &self.store
    }

    pub fn state(&self) -> &PageState {
        self.store.state()
    }

    pub fn pending_messages(&self) -> usize {
        self.adapter.queue().len()
    }

    pub fn dropped_messages(&self) -> u64 {
        self.adapter.dropped()
    }

    pub fn current_step(&self) -> usize {
        self.steps.current()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    pub fn router(&self) -> &ChangeRouter {
        &self.router
    }

    pub fn transport(&self) -> &T {
        self.adapter.transport()
    }

    fn drain_inbox(&mut self) {
        while !self.quit {
            match self.inbox.try_recv() {
                Ok(command) => self.handle(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
    }

    fn finish_pass(&mut self) -> bool {
        self.reconcile();

        if !self.dirty {
            return false;
        }

        self.dirty = false;
        let props = self.props();
        self.publish(PageEvent::Rendered(props));
        true
    }

    fn publish(&self, event: PageEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                trace!("no page event listener");
            }
        }
    }
}
