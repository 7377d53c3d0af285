//! # Arena Server Library
//!
//! Authoritative server for a top-down multiplayer shooter. It owns all game
//! state (player transforms, health, projectiles), accepts datagrams from
//! clients, advances the simulation on fixed timers and broadcasts the
//! results to every connected player.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! One loop owns the [`game::GameState`]. It handles inbound datagrams as
//! they arrive and interleaves them with three independent timers:
//! - **Projectile tick** (100ms): moves projectiles, retires expired ones and
//!   broadcasts their positions
//! - **Collision tick** (10ms): projectile-vs-player hits, damage,
//!   eliminations and the win condition
//! - **Heartbeat sweep** (1s): evicts players who stopped sending heartbeats
//!
//! Each of these is a discrete transaction on the state; any resulting
//! broadcast is queued only after the transaction has finished.
//!
//! ### UDP-Based Communication
//! All traffic is JSON over a single UDP socket. Sends are fire-and-forget
//! and happen on a dedicated task, so no tick ever waits on the network.
//! A lost update is simply superseded by the next one.
//!
//! ### Trust Model
//! Client-reported positions, rotations and health are stored as sent.
//! Only rotation is normalized and health is clamped into range; there is
//! no movement validation.
//!
//! ## Module Organization
//!
//! - [`session_manager`]: player registry, heartbeats, damage and elimination
//! - [`projectile`]: projectile spawning, movement and expiry
//! - [`game`]: the state container and collision/combat resolution
//! - [`network`]: socket tasks, broadcast dispatch and tick scheduling
//! - [`config`]: timer periods and timeouts
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("0.0.0.0:41234", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
pub mod projectile;
pub mod session_manager;

use env_logger::{Builder, Env};

/// Log filter used when the filter variable is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Builds a logger configured from the `filter_var` environment variable
///
/// Falls back to [`DEFAULT_LOG_FILTER`] so joins, evictions, hits and
/// dropped datagrams are visible without any setup.
pub fn logger_builder(filter_var: &str) -> Builder {
    Builder::from_env(
        Env::new()
            .filter_or(filter_var, DEFAULT_LOG_FILTER)
            .write_style(env_logger::DEFAULT_WRITE_STYLE_ENV),
    )
}

/// Installs the global logger, honouring `RUST_LOG`
pub fn init_logging() {
    logger_builder(env_logger::DEFAULT_FILTER_ENV).init();
}
