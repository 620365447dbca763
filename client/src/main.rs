//! Client binary: connects, spawns a ship under the reserved id, and runs
//! the frame loop.

use clap::Parser;
use client::GameClient;
use log::{info, warn};
use shared::units::{Ship, SHIP_TAG};
use shared::{IdAllocator, Message, Player, Replica, PORT_LOSSY, PORT_RELIABLE, TICK_MILLIS};
use std::time::{Duration, Instant};
use tokio::time::interval;

#[derive(Parser, Debug)]
#[clap(author, version, about = "State replication client")]
struct Args {
    /// Server address
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port of the reliable-ordered channel
    #[clap(long, default_value_t = PORT_RELIABLE)]
    reliable_port: u16,

    /// Port of the best-effort snapshot channel
    #[clap(long, default_value_t = PORT_LOSSY)]
    lossy_port: u16,

    /// Player name (the unique player id is derived from it)
    #[clap(short, long, default_value = "pilot")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let player = Player::new(&args.name);
    info!("logging in as {}", player.player_id());

    let mut client =
        GameClient::connect(&args.host, args.reliable_port, args.lossy_port, player).await?;

    let mut frame_interval = interval(Duration::from_millis(TICK_MILLIS));
    let mut last_frame = Instant::now();
    let mut spawned = false;
    let mut frames: u64 = 0;
    let ids = IdAllocator::new();

    loop {
        frame_interval.tick().await;
        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;

        client.tick(dt);

        if client.sync().is_rejected() {
            warn!("login refused, exiting");
            break;
        }
        if !client.is_connected() {
            warn!("connection lost, exiting");
            break;
        }

        // Spawn our ship once the server has handed out the reserved id.
        if !spawned {
            if let Some(id) = client.sync_mut().take_reserved_id() {
                let owner = client.player().player_id().to_string();
                let mut ship = Ship::new(&ids, &owner, 100);
                ship.core_mut().force_id(&id);
                let blob = ship.encode_create();
                client.send_reliable(&Message::SpawnPlayer {
                    tag: SHIP_TAG.to_string(),
                    blob,
                    player: client.player().clone(),
                });
                info!("spawned ship {} for {}", id, owner);
                spawned = true;
            }
        }

        frames += 1;
        if frames % 200 == 0 {
            info!(
                "frame {}: {} entities, last snapshot at {}",
                frames,
                client.sync().registry.len(),
                client.sync().last_snapshot_time()
            );
        }
    }

    Ok(())
}
