use std::thread::{self, JoinHandle};

use super::{
    Page, PageCommand, PageCommandReceiver, PageCommandSender, PageEventSender,
};
use crate::config::PageConfig;
use crate::prelude::*;
use crate::time::{Clock, ClockTicker};
use crate::transport::Transport;

/// Runs a [`Page`] on its own thread with a [`ClockTicker`] feeding it ticks.
///
/// Shutdown stops the clock first, then asks the page to quit and joins it,
/// so no tick or change is delivered after [`PageRuntime::stop`] returns.
pub struct PageRuntime {
    commands: PageCommandSender,
    ticker: ClockTicker,
    page_handle: Option<JoinHandle<()>>,
}

impl PageRuntime {
    pub fn start<T: Transport + 'static>(
        config: &PageConfig,
        transport: T,
        channel: (PageCommandSender, PageCommandReceiver),
        events: Option<PageEventSender>,
    ) -> Self {
        let (commands, inbox) = channel;

        let mut page =
            Page::with_channel(config, transport, commands.clone(), inbox);
        if let Some(events) = events {
            page = page.with_events(events);
        }

        let page_handle = thread::spawn(move || page.run());

        let ticker = {
            let commands = commands.clone();
            ClockTicker::start(
                Clock::new(config.bpm, &config.division),
                config.clock_resolution(),
                move |tick| {
                    let _ = commands.send(PageCommand::Tick(tick));
                },
            )
        };

        info!(
            "page running at {} bpm, {} division",
            config.bpm, config.division
        );

        Self {
            commands,
            ticker,
            page_handle: Some(page_handle),
        }
    }

    pub fn commands(&self) -> PageCommandSender {
        self.commands.clone()
    }

    /// The ticker publishes `Tick(0)` itself, ordered after any tick it had
    /// already computed.
    pub fn reset_clock(&self) {
        self.ticker.reset();
    }

    pub fn set_tempo(&self, bpm: f32, division: &str) {
        self.ticker.set_tempo(bpm, division);
    }

    pub fn is_running(&self) -> bool {
        self.page_handle.is_some()
    }

    pub fn stop(&mut self) {
        self.ticker.stop();

        let Some(handle) = self.page_handle.take() else {
            return;
        };

        let _ = self.commands.send(PageCommand::Quit);
        if handle.join().is_err() {
            error!("page thread panicked");
        }
    }
}

impl Drop for PageRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}
