// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use clap::Parser;
use neotetris_core::{component_span, init_tracing};
use neotetris_net::{PongServer, SERVER_PATH};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Answer local Ping datagrams with Pong")]
struct Args {
    /// Socket path to bind; a stale file there is replaced
    #[arg(long, default_value = SERVER_PATH)]
    server_path: PathBuf,
    /// Stop after this many pings (default: serve forever)
    #[arg(long)]
    count: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let _span = component_span("Pong").entered();

    info!("starting up");
    let server = PongServer::bind(&args.server_path)
        .with_context(|| format!("binding {}", args.server_path.display()))?;
    let pings = server.serve(args.count).context("serving pings")?;

    info!("shutting down after {pings} pings");
    drop(server);
    info!("exiting");
    Ok(())
}
