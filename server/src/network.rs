//! Server network layer handling UDP communications and tick scheduling

use crate::config::ServerConfig;
use crate::game::{GameState, Outbound};
use log::{debug, error, info, warn};
use shared::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Largest datagram the receiver accepts
const RECV_BUFFER_SIZE: usize = 2048;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { message: Message, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from game loop to the sender task
///
/// Payloads are already encoded and broadcast recipients are resolved by the
/// game loop, so the sender never needs to look at game state.
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        payload: Vec<u8>,
        addr: SocketAddr,
    },
    BroadcastPacket {
        payload: Vec<u8>,
        recipients: Vec<SocketAddr>,
    },
}

/// Stops a running [`Server`] from another task
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating networking and game simulation
///
/// The run loop is the only owner of [`GameState`]. Inbound datagrams and
/// the three timers are handled one at a time, so every state transaction
/// completes before the next one starts.
pub struct Server {
    socket: Arc<UdpSocket>,
    game_state: GameState,
    config: ServerConfig,
    tasks: Vec<JoinHandle<()>>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            game_state: GameState::new(),
            config,
            tasks: Vec::new(),
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that continuously listens for incoming datagrams
    ///
    /// Malformed datagrams are logged and dropped here and never reach the
    /// game loop.
    fn spawn_network_receiver(&mut self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        self.tasks.push(tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Message::decode(&buffer[..len]) {
                        Ok(message) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { message, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Dropping datagram from {}: {}", addr, e);
                        }
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        }));
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);

        self.tasks.push(tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { payload, addr } => {
                        if let Err(e) = socket.send_to(&payload, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket {
                        payload,
                        recipients,
                    } => {
                        for addr in recipients {
                            if let Err(e) = socket.send_to(&payload, addr).await {
                                error!("Failed to broadcast to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        }));
    }

    /// Encodes outbound messages and queues them for the sender task
    ///
    /// Broadcast recipients are taken from the registry as it stands after
    /// the transaction that produced the messages.
    fn dispatch(&self, events: Vec<Outbound>) {
        for event in events {
            let (message, recipients) = match event {
                Outbound::Reply { addr, message } => (message, vec![addr]),
                Outbound::Broadcast(message) => (message, self.game_state.sessions.addrs()),
            };
            if recipients.is_empty() {
                continue;
            }

            let payload = match message.encode() {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };

            let queued = if let [addr] = recipients[..] {
                self.game_tx.send(GameMessage::SendPacket { payload, addr })
            } else {
                self.game_tx.send(GameMessage::BroadcastPacket {
                    payload,
                    recipients,
                })
            };
            if let Err(e) = queued {
                error!("Failed to queue outgoing packet: {}", e);
            }
        }
    }

    fn timer(period: Duration) -> Interval {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut projectile_timer = Self::timer(self.config.projectile_tick);
        let mut collision_timer = Self::timer(self.config.collision_tick);
        let mut heartbeat_timer = Self::timer(self.config.heartbeat_sweep);

        info!("Server started successfully");

        loop {
            let events = tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { message, addr }) => {
                            debug!("Received {:?} from {}", message, addr);
                            self.game_state.handle_message(message, addr, Instant::now())
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = projectile_timer.tick() => {
                    self.game_state
                        .projectile_tick(Instant::now(), self.config.projectile_lifetime)
                },

                _ = collision_timer.tick() => {
                    self.game_state.collision_tick()
                },

                _ = heartbeat_timer.tick() => {
                    self.game_state
                        .heartbeat_sweep(Instant::now(), self.config.heartbeat_timeout)
                },
            };

            self.dispatch(events);
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}
