//! Session registry for connected players
//!
//! This module tracks every player the server currently knows about:
//! - Join handling with name uniqueness enforcement
//! - Client-reported transform updates
//! - Heartbeat bookkeeping and stale-session eviction
//! - Damage application and the one-way elimination transition
//!
//! Sessions are kept in join order. The collision resolver relies on this
//! order when several players are within reach of the same projectile.

use log::info;
use shared::{normalize_rotation, PlayerTransform, Vector2, MAX_HEALTH, SPAWN_X, SPAWN_Y};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Server-side record of one connected player
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique player name, fixed for the session's lifetime
    pub name: String,
    /// Endpoint captured at join time; all broadcasts go here
    pub addr: SocketAddr,
    pub position: Vector2,
    /// Degrees in `[0, 360)`
    pub rotation: f32,
    /// Always within `[0, MAX_HEALTH]`
    pub health: i32,
    pub score: u32,
    /// Last time a heartbeat arrived from this player
    pub last_heartbeat: Instant,
    /// Cleared exactly once, when health reaches zero
    pub alive: bool,
}

impl Session {
    /// Creates a freshly spawned session at the default spawn point
    pub fn new(name: String, addr: SocketAddr, now: Instant) -> Self {
        Self {
            name,
            addr,
            position: Vector2::new(SPAWN_X, SPAWN_Y),
            rotation: 0.0,
            health: MAX_HEALTH,
            score: 0,
            last_heartbeat: now,
            alive: true,
        }
    }

    /// Returns true if no heartbeat arrived within `timeout` before `now`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }

    /// Snapshot of the session in the shape clients expect for `CHANGE_INFO`
    pub fn transform(&self) -> PlayerTransform {
        PlayerTransform {
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            rotation: self.rotation,
            health: self.health,
            is_shot: false,
        }
    }
}

/// Reasons a join request can be refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("name is already taken")]
    NameTaken,
}

/// Result of applying a client-reported move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Unknown name or eliminated player; nothing changed
    Ignored,
    /// Transform stored. `shot` asks the caller to spawn a projectile and
    /// `eliminated` reports a self-reported drop to zero health.
    Applied { shot: bool, eliminated: bool },
}

/// Result of applying damage to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub health: i32,
    pub became_eliminated: bool,
}

/// Registry of all currently connected sessions, in join order
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: Vec<Session>,
}

impl SessionManager {
    /// Creates an empty registry
    ///
    /// The server starts with no players; sessions are only added through
    /// [`SessionManager::register`].
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
        }
    }

    /// Registers a new player under `name`
    ///
    /// Fails with [`RegisterError::NameTaken`] if a session with that name is
    /// currently registered. The existing session is left untouched.
    pub fn register(
        &mut self,
        name: &str,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<(), RegisterError> {
        if self.get(name).is_some() {
            return Err(RegisterError::NameTaken);
        }

        info!("Player '{}' joined from {}", name, addr);
        self.sessions.push(Session::new(name.to_string(), addr, now));
        Ok(())
    }

    /// Stores a client-reported transform verbatim
    ///
    /// Position and rotation are trusted as sent; only the rotation is
    /// normalized and health is clamped into range. Eliminated players
    /// stay frozen.
    pub fn apply_move(&mut self, transform: &PlayerTransform) -> MoveOutcome {
        let Some(session) = self.get_mut(&transform.name) else {
            return MoveOutcome::Ignored;
        };
        if !session.alive {
            return MoveOutcome::Ignored;
        }

        session.position = Vector2::new(transform.x, transform.y);
        session.rotation = normalize_rotation(transform.rotation);
        session.health = transform.health.clamp(0, MAX_HEALTH);

        let eliminated = session.health == 0;
        if eliminated {
            session.alive = false;
            info!("Player '{}' reported zero health", session.name);
        }

        MoveOutcome::Applied {
            shot: transform.is_shot && !eliminated,
            eliminated,
        }
    }

    /// Refreshes the heartbeat timestamp. Returns false for unknown names.
    pub fn heartbeat(&mut self, name: &str, now: Instant) -> bool {
        if let Some(session) = self.get_mut(name) {
            session.last_heartbeat = now;
            true
        } else {
            false
        }
    }

    /// Removes every session whose heartbeat is older than `timeout`
    ///
    /// Returns the evicted names in join order so the caller can announce
    /// each departure.
    pub fn evict_stale(&mut self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut evicted = Vec::new();
        self.sessions.retain(|session| {
            if session.is_timed_out(now, timeout) {
                info!("Player '{}' timed out", session.name);
                evicted.push(session.name.clone());
                false
            } else {
                true
            }
        });
        evicted
    }

    /// Subtracts `amount` from the session's health, flooring at zero
    ///
    /// `became_eliminated` is true only on the call that takes a living
    /// session to zero. Returns None for unknown names.
    pub fn apply_damage(&mut self, name: &str, amount: i32) -> Option<DamageOutcome> {
        let session = self.get_mut(name)?;
        session.health = (session.health - amount).max(0);

        let became_eliminated = session.alive && session.health == 0;
        if became_eliminated {
            session.alive = false;
        }

        Some(DamageOutcome {
            health: session.health,
            became_eliminated,
        })
    }

    /// Awards the shooter a point for landing a hit
    pub fn credit_hit(&mut self, name: &str) {
        if let Some(session) = self.get_mut(name) {
            session.score += 1;
        }
    }

    /// Number of registered sessions that have not been eliminated
    ///
    /// Evicted players are no longer registered and do not count, while
    /// eliminated players stay registered but are excluded here.
    pub fn alive_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.alive).count()
    }

    /// Name of the only living player, if exactly one remains
    pub fn sole_survivor(&self) -> Option<&str> {
        let mut alive = self.sessions.iter().filter(|s| s.alive);
        match (alive.next(), alive.next()) {
            (Some(session), None) => Some(&session.name),
            _ => None,
        }
    }

    /// Looks up a session by player name
    ///
    /// Names are unique among registered sessions, so at most one session
    /// can match. Returns None once the player has been evicted.
    pub fn get(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.name == name)
    }

    /// Sessions in join order
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    /// Endpoints of every registered session, used for broadcasting
    ///
    /// Eliminated players are included so they keep receiving updates
    /// until they disconnect.
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|s| s.addr).collect()
    }

    /// Number of registered sessions, alive or eliminated
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
