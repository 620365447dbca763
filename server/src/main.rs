//! Server binary: parses arguments and runs the arena server.

use clap::Parser;
use server::{ArenaLogic, NetworkServer, ServerCore};
use shared::{PORT_LOSSY, PORT_RELIABLE, TICK_MILLIS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Authoritative state replication server")]
struct Args {
    /// IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port of the reliable-ordered channel
    #[clap(long, default_value_t = PORT_RELIABLE)]
    reliable_port: u16,

    /// Port of the best-effort snapshot channel
    #[clap(long, default_value_t = PORT_LOSSY)]
    lossy_port: u16,

    /// Tick period in milliseconds
    #[clap(short, long, default_value_t = TICK_MILLIS)]
    tick_millis: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let core = ServerCore::new(Box::new(ArenaLogic::new()));
    let mut server = NetworkServer::new(
        &args.host,
        args.reliable_port,
        args.lossy_port,
        Duration::from_millis(args.tick_millis),
        core,
    )
    .await?;

    server.run().await
}
