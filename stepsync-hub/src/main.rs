use std::error::Error;

use clap::Parser;
use stepsync::config::{DEFAULT_LISTEN_ADDR, HubConfig};
use stepsync::core::logging::init_logger;
use stepsync::hub::HubServer;
use stepsync::transport::DEFAULT_MAX_FRAME_BYTES;

#[derive(Parser, Debug)]
#[command(name = "stepsync-hub", about = "Relays page updates between peers")]
struct Args {
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    listen: String,
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let args = Args::parse();

    let config = HubConfig {
        listen_addr: args.listen,
        max_frame_bytes: args.max_frame_bytes,
        ..HubConfig::default()
    };

    let mut hub = HubServer::start(&config)?;
    log::info!("stepsync-hub ready on {}", hub.local_addr());
    hub.wait();

    Ok(())
}
