#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};

use stepsync::config::PageConfig;
use stepsync::page::Page;
use stepsync::protocol::{Message, encode};
use stepsync::state::PageState;
use stepsync::transport::MemoryTransport;

pub fn memory_page() -> (Page<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::new();
    let page = Page::new(&PageConfig::default(), transport.clone());
    (page, transport)
}

pub fn sync_payload(state: PageState) -> String {
    encode(&Message::sync(state)).unwrap()
}

pub fn update_payload(state: PageState) -> String {
    encode(&Message::update(state)).unwrap()
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(
    timeout: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
