// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use clap::Parser;
use neotetris_core::{component_span, init_tracing};
use neotetris_net::{PingClient, SERVER_PATH};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send one Ping to the local pong server")]
struct Args {
    /// Socket path the pong server is bound to
    #[arg(long, default_value = SERVER_PATH)]
    server_path: PathBuf,
    /// How long to wait for the reply; 0 sends without waiting
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let _span = component_span("Ping").entered();

    info!("starting up");
    let client = PingClient::new("Ping").context("binding client socket")?;

    let reply = client
        .ping(&args.server_path, Duration::from_millis(args.timeout_ms))
        .with_context(|| format!("pinging {}", args.server_path.display()))?;
    match reply {
        Some(bytes) => info!("reply: {}", String::from_utf8_lossy(&bytes)),
        None => info!("no reply within {} ms", args.timeout_ms),
    }

    info!("commencing client teardown");
    drop(client);
    info!("exiting");
    Ok(())
}
