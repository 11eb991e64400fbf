mod support;

use std::net::TcpListener;
use std::time::{Duration, Instant};

use serial_test::serial;
use stepsync::config::{HubConfig, PageConfig};
use stepsync::hub::{HubHandle, HubServer};
use stepsync::page::{ControlTarget, Page, PageCommand, command_channel};
use stepsync::transport::{BackoffPolicy, TcpTransport, TcpTransportConfig};

use support::wait_until;

fn start_hub() -> HubHandle {
    HubServer::start(&HubConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..HubConfig::default()
    })
    .unwrap()
}

fn tcp_page(hub: &HubHandle) -> Page<TcpTransport> {
    let (commands, inbox) = command_channel();
    let sink = commands.clone();
    let transport = TcpTransport::connect(
        TcpTransportConfig {
            backoff: BackoffPolicy {
                base: Duration::from_millis(10),
                max: Duration::from_millis(50),
            },
            max_frame_bytes: 64 * 1024,
            ..TcpTransportConfig::new(hub.local_addr().to_string())
        },
        Box::new(move |raw| {
            let _ = sink.send(PageCommand::Inbound(raw));
        }),
    );
    Page::with_channel(&PageConfig::default(), transport, commands, inbox)
}

#[test]
#[serial]
fn edits_propagate_between_pages() {
    let hub = start_hub();
    let mut left = tcp_page(&hub);
    let mut right = tcp_page(&hub);

    assert!(wait_until(Duration::from_secs(5), || {
        left.transport().is_connected()
            && right.transport().is_connected()
            && hub.clients().map(|c| c.len() == 2).unwrap_or(false)
    }));

    left.on_control_change(ControlTarget::new(0, 7), 64.0);

    assert!(wait_until(Duration::from_secs(5), || {
        right.process();
        right.store().get(0, 7) == 64
    }));

    right.on_control_change(ControlTarget::new(1, 3), 12.0);

    assert!(wait_until(Duration::from_secs(5), || {
        left.process();
        left.store().get(1, 3) == 12
    }));
    assert_eq!(left.state(), right.state());
}

#[test]
#[serial]
fn edits_apply_locally_while_the_hub_is_down() {
    let hub = start_hub();
    let mut page = tcp_page(&hub);
    assert!(wait_until(Duration::from_secs(5), || {
        page.transport().is_connected()
    }));

    drop(hub);
    assert!(wait_until(Duration::from_secs(5), || {
        !page.transport().is_connected()
    }));

    page.on_control_change(ControlTarget::new(1, 1), 80.0);
    assert_eq!(page.store().get(1, 1), 80);
    assert_eq!(page.router().failed(), 1);
}

#[test]
#[serial]
fn local_edits_never_wait_on_a_stalled_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let (commands, inbox) = command_channel();
    let transport = TcpTransport::connect(
        TcpTransportConfig::new(listener.local_addr().unwrap().to_string()),
        Box::new(|_| {}),
    );
    let mut page =
        Page::with_channel(&PageConfig::default(), transport, commands, inbox);

    // Accepted but never read from.
    let (_peer, _) = listener.accept().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        page.transport().is_connected()
    }));

    let started = Instant::now();
    for control in 0..2000 {
        page.on_control_change(ControlTarget::new(1, control), 50.0);
    }

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(page.store().get(1, 1999), 50);
    assert!(page.router().failed() > 0);
}
