//! Headless bot for exercising a running server
//!
//! Joins under a name, keeps its session alive with heartbeats, wanders
//! around firing at random and logs every broadcast it receives.

use clap::Parser;
use log::{debug, error, info, warn};
use rand::Rng;
use shared::{
    Message, MoveData, PlayerTransform, ShootEvent, DEFAULT_PORT, HEARTBEAT_INTERVAL_MS,
    MAX_HEALTH, SPAWN_X, SPAWN_Y,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    server: SocketAddr,

    /// Player name to join with
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Milliseconds between position updates
    #[arg(long, default_value = "200")]
    move_interval_ms: u64,

    /// Chance of firing on each position update
    #[arg(long, default_value = "0.2")]
    shot_chance: f64,

    /// Stop after this many seconds
    #[arg(short = 'd', long, default_value = "30")]
    duration_secs: u64,
}

async fn send(socket: &UdpSocket, server: SocketAddr, message: &Message) {
    match message.encode() {
        Ok(payload) => {
            if let Err(e) = socket.send_to(&payload, server).await {
                error!("Failed to send {:?}: {}", message, e);
            }
        }
        Err(e) => error!("Failed to encode {:?}: {}", message, e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_logging();
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    send(&socket, args.server, &Message::Join { name: args.name.clone() }).await;

    let mut buf = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await??;
    match Message::decode(&buf[..len])? {
        Message::NameAccepted => info!("Joined as '{}'", args.name),
        Message::NameTaken => {
            error!("Name '{}' is already taken", args.name);
            return Ok(());
        }
        other => {
            error!("Expected a join reply but got {:?}", other);
            return Ok(());
        }
    }

    let mut rng = rand::thread_rng();
    let mut transform = PlayerTransform {
        name: args.name.clone(),
        x: SPAWN_X,
        y: SPAWN_Y,
        rotation: 0.0,
        health: MAX_HEALTH,
        is_shot: false,
    };

    let mut heartbeat_timer = interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS));
    let mut move_timer = interval(Duration::from_millis(args.move_interval_ms.max(1)));
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    let mut alive = true;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                info!("Test client finished");
                break;
            }

            _ = heartbeat_timer.tick() => {
                let heartbeat = Message::Move {
                    source: None,
                    data: MoveData::Heartbeat { name: args.name.clone() },
                };
                send(&socket, args.server, &heartbeat).await;
            }

            _ = move_timer.tick(), if alive => {
                transform.x += rng.gen_range(-10.0..=10.0);
                transform.y += rng.gen_range(-10.0..=10.0);
                transform.rotation = rng.gen_range(0.0..360.0);
                transform.is_shot = rng.gen_bool(args.shot_chance.clamp(0.0, 1.0));

                let update = Message::Move {
                    source: None,
                    data: MoveData::ChangeInfo(transform.clone()),
                };
                send(&socket, args.server, &update).await;
            }

            received = socket.recv_from(&mut buf) => {
                let (len, _) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        continue;
                    }
                };

                match Message::decode(&buf[..len]) {
                    Ok(Message::Move { data: MoveData::ChangeInfo(update), .. }) if update.name == args.name => {
                        // Server-side hits overwrite our locally tracked health
                        transform.health = update.health;
                        debug!("Own state: {:?}", update);
                    }
                    Ok(Message::Move { data: MoveData::DeletePlayer { name }, .. }) => {
                        info!("Player '{}' left", name);
                    }
                    Ok(Message::Shoot(ShootEvent::Add(bullet))) => {
                        debug!("Projectile {} fired by '{}'", bullet.id, bullet.owner);
                    }
                    Ok(Message::PlayerEliminated { data, .. }) => {
                        info!("Player '{}' eliminated", data.name);
                        if data.name == args.name {
                            alive = false;
                        }
                    }
                    Ok(Message::GameWon { name }) => {
                        info!("Player '{}' won the game", name);
                    }
                    Ok(other) => debug!("Received {:?}", other),
                    Err(e) => warn!("Failed to decode server message: {}", e),
                }
            }
        }
    }

    Ok(())
}
