//! Terminal peer: runs a page against a hub and lets you edit controls by
//! typing `<panel> <control> <value>` lines on stdin. `reset` restarts the
//! clock and `quit` exits.

use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use clap::Parser;
use stepsync::config::PageConfig;
use stepsync::core::logging::init_logger;
use stepsync::page::{
    ControlTarget, PageCommand, PageEvent, PageProps, PageRuntime,
    command_channel,
};
use stepsync::transport::{TcpTransport, TcpTransportConfig};

#[derive(Parser, Debug)]
#[command(name = "stepsync-console")]
struct Args {
    /// Page config (YAML). Defaults to page.yaml in the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `hub_addr` from the config.
    #[arg(long)]
    hub: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let args = Args::parse();

    let mut config = PageConfig::load_or_default(args.config.as_deref())?;
    if let Some(hub) = args.hub {
        config.hub_addr = hub;
    }

    let (commands, inbox) = command_channel();

    let transport = {
        let commands = commands.clone();
        TcpTransport::connect(
            TcpTransportConfig {
                backoff: config.backoff,
                max_frame_bytes: config.max_frame_bytes,
                ..TcpTransportConfig::new(config.hub_addr.clone())
            },
            Box::new(move |raw| {
                let _ = commands.send(PageCommand::Inbound(raw));
            }),
        )
    };

    let (events_tx, events) = mpsc::channel();
    let mut runtime = PageRuntime::start(
        &config,
        transport,
        (commands, inbox),
        Some(events_tx),
    );

    let renderer = thread::spawn(move || {
        let mut last_values = String::new();
        for event in events {
            match event {
                PageEvent::Rendered(props) => {
                    let values = describe_values(&props);
                    if values != last_values {
                        log::info!("{}", values);
                        last_values = values;
                    }
                }
                PageEvent::Stopped => break,
            }
        }
    });

    let commands = runtime.commands();
    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "reset" => runtime.reset_clock(),
            input => match parse_change(input) {
                Some(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                None => log::warn!(
                    "expected '<panel> <control> <value>', got '{}'",
                    input
                ),
            },
        }
    }

    runtime.stop();
    let _ = renderer.join();

    Ok(())
}

fn parse_change(input: &str) -> Option<PageCommand> {
    let mut parts = input.split_whitespace();
    let panel = parts.next()?.parse().ok()?;
    let control = parts.next()?.parse().ok()?;
    let value = parts.next()?.parse().ok()?;

    if parts.next().is_some() {
        return None;
    }

    Some(PageCommand::ControlChange {
        target: ControlTarget::new(panel, control),
        value,
    })
}

fn describe_values(props: &PageProps) -> String {
    let knobs = props
        .sequencer()
        .map(|grid| {
            grid.items
                .iter()
                .map(|item| item.knob.value.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    let sliders = props
        .sliders()
        .map(|row| {
            row.items
                .iter()
                .map(|item| item.slider.value.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    format!("knobs [{}] sliders [{}]", knobs, sliders)
}
