use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use shared::{
    COLLISION_TICK_MS, DEFAULT_PORT, HEARTBEAT_SWEEP_MS, HEARTBEAT_TIMEOUT_MS,
    PROJECTILE_LIFETIME_MS, PROJECTILE_TICK_MS,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Projectile movement and broadcast period in milliseconds
    #[arg(long, default_value_t = PROJECTILE_TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    projectile_tick_ms: u64,

    /// Collision check period in milliseconds
    #[arg(long, default_value_t = COLLISION_TICK_MS, value_parser = clap::value_parser!(u64).range(1..))]
    collision_tick_ms: u64,

    /// Heartbeat sweep period in milliseconds
    #[arg(long, default_value_t = HEARTBEAT_SWEEP_MS, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_sweep_ms: u64,

    /// Evict players silent for longer than this many milliseconds
    #[arg(long, default_value_t = HEARTBEAT_TIMEOUT_MS)]
    heartbeat_timeout_ms: u64,

    /// Projectile lifetime in milliseconds
    #[arg(long, default_value_t = PROJECTILE_LIFETIME_MS)]
    projectile_lifetime_ms: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            projectile_tick: Duration::from_millis(self.projectile_tick_ms),
            collision_tick: Duration::from_millis(self.collision_tick_ms),
            heartbeat_sweep: Duration::from_millis(self.heartbeat_sweep_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            projectile_lifetime: Duration::from_millis(self.projectile_lifetime_ms),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_logging();

    let args = Args::parse();
    let config = args.server_config();
    info!("Starting server with {:?}", config);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
