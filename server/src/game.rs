//! Authoritative game state and combat resolution
//!
//! `GameState` is the single owner of the session registry and the live
//! projectiles. Every operation is a discrete transaction: it mutates state
//! and returns the messages that must go out as a result, so the caller can
//! send them after the mutation has completed.

use crate::projectile::ProjectileManager;
use crate::session_manager::{MoveOutcome, SessionManager};
use log::{debug, info, warn};
use shared::{Message, MoveData, ShootEvent, Source, COLLISION_RADIUS, HIT_DAMAGE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A message produced by a state transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Sent only to the given endpoint
    Reply { addr: SocketAddr, message: Message },
    /// Sent to every registered session
    Broadcast(Message),
}

#[derive(Debug, Default)]
pub struct GameState {
    pub sessions: SessionManager,
    pub projectiles: ProjectileManager,
    winner_declared: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            sessions: SessionManager::new(),
            projectiles: ProjectileManager::new(),
            winner_declared: false,
        }
    }

    pub fn winner_declared(&self) -> bool {
        self.winner_declared
    }

    /// Processes one decoded datagram from `addr`
    pub fn handle_message(
        &mut self,
        message: Message,
        addr: SocketAddr,
        now: Instant,
    ) -> Vec<Outbound> {
        match message {
            Message::Join { name } => self.handle_join(&name, addr, now),
            Message::Move { data, .. } => self.handle_move(data, now),
            other => {
                warn!("Unexpected message from {}: {:?}", addr, other);
                Vec::new()
            }
        }
    }

    /// Registers a player and answers the requester only
    pub fn handle_join(&mut self, name: &str, addr: SocketAddr, now: Instant) -> Vec<Outbound> {
        let accepted = match self.sessions.register(name, addr, now) {
            Ok(()) => true,
            Err(e) => {
                info!("Rejected join '{}' from {}: {}", name, addr, e);
                false
            }
        };

        vec![Outbound::Reply {
            addr,
            message: Message::join_ack(accepted),
        }]
    }

    pub fn handle_move(&mut self, data: MoveData, now: Instant) -> Vec<Outbound> {
        let mut events = Vec::new();

        match data {
            MoveData::ChangeInfo(transform) => {
                let MoveOutcome::Applied { shot, eliminated } = self.sessions.apply_move(&transform)
                else {
                    debug!("Ignoring move for '{}'", transform.name);
                    return events;
                };
                let Some(session) = self.sessions.get(&transform.name) else {
                    return events;
                };

                let mut echo = session.transform();
                echo.is_shot = transform.is_shot;
                let (origin, rotation) = (session.position, session.rotation);

                events.push(Outbound::Broadcast(Message::Move {
                    source: Some(Source::Client),
                    data: MoveData::ChangeInfo(echo),
                }));

                if shot {
                    let projectile = self.projectiles.spawn(&transform.name, origin, rotation, now);
                    debug!("Projectile {} fired by '{}'", projectile.id, projectile.owner);
                    events.push(Outbound::Broadcast(Message::Shoot(ShootEvent::Add(
                        projectile.to_bullet_state(),
                    ))));
                }

                if eliminated {
                    self.announce_elimination(&transform.name, &mut events);
                }
            }
            MoveData::Heartbeat { name } => {
                if !self.sessions.heartbeat(&name, now) {
                    debug!("Heartbeat from unknown player '{}'", name);
                }
            }
            MoveData::DeletePlayer { name } => {
                warn!("Ignoring client-sent delete for '{}'", name);
            }
        }

        events
    }

    /// Advances every projectile, then retires the ones past `lifetime`
    pub fn projectile_tick(&mut self, now: Instant, lifetime: Duration) -> Vec<Outbound> {
        self.projectiles.advance_all();

        let mut events: Vec<Outbound> = self
            .projectiles
            .expire_older_than(now, lifetime)
            .into_iter()
            .map(|id| {
                debug!("Projectile {} expired", id);
                Outbound::Broadcast(Message::Shoot(ShootEvent::Remove { id }))
            })
            .collect();

        events.extend(self.projectiles.iter().map(|projectile| {
            Outbound::Broadcast(Message::Shoot(ShootEvent::Update(
                projectile.to_bullet_state(),
            )))
        }));

        events
    }

    /// Tests every projectile against every other player and applies hits
    ///
    /// Each projectile hits at most one player: the first one in join order
    /// within the collision radius.
    pub fn collision_tick(&mut self) -> Vec<Outbound> {
        let hits: Vec<(u64, String, String)> = self
            .projectiles
            .iter()
            .filter_map(|projectile| {
                self.sessions
                    .iter()
                    .find(|session| {
                        session.name != projectile.owner
                            && session.position.distance(&projectile.position) < COLLISION_RADIUS
                    })
                    .map(|session| (projectile.id, projectile.owner.clone(), session.name.clone()))
            })
            .collect();

        let mut events = Vec::new();
        for (projectile_id, owner, target) in hits {
            self.apply_hit(projectile_id, &owner, &target, &mut events);
        }
        events
    }

    /// Evicts players whose heartbeat is older than `timeout`
    pub fn heartbeat_sweep(&mut self, now: Instant, timeout: Duration) -> Vec<Outbound> {
        self.sessions
            .evict_stale(now, timeout)
            .iter()
            .map(|name| Outbound::Broadcast(Message::delete_player(name)))
            .collect()
    }

    fn apply_hit(
        &mut self,
        projectile_id: u64,
        owner: &str,
        target: &str,
        events: &mut Vec<Outbound>,
    ) {
        let Some(outcome) = self.sessions.apply_damage(target, HIT_DAMAGE) else {
            return;
        };
        info!(
            "Projectile {} from '{}' hit '{}' (health {})",
            projectile_id, owner, target, outcome.health
        );
        self.sessions.credit_hit(owner);

        if outcome.became_eliminated {
            self.announce_elimination(target, events);
        } else if let Some(session) = self.sessions.get(target) {
            events.push(Outbound::Broadcast(Message::Move {
                source: Some(Source::Server),
                data: MoveData::ChangeInfo(session.transform()),
            }));
        }

        self.projectiles.remove(projectile_id);
        events.push(Outbound::Broadcast(Message::Shoot(ShootEvent::Remove {
            id: projectile_id,
        })));
    }

    /// Announces an elimination, and the winner if it leaves one survivor
    /// out of a roster of at least two
    fn announce_elimination(&mut self, name: &str, events: &mut Vec<Outbound>) {
        info!("Player '{}' eliminated", name);
        events.push(Outbound::Broadcast(Message::player_eliminated(name)));

        if self.winner_declared || self.sessions.len() < 2 {
            return;
        }
        if let Some(winner) = self.sessions.sole_survivor() {
            info!("Player '{}' wins", winner);
            events.push(Outbound::Broadcast(Message::game_won(winner)));
            self.winner_declared = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerTransform, Vector2, MAX_HEALTH};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn change_info(
        name: &str,
        x: f32,
        y: f32,
        rotation: f32,
        health: i32,
        is_shot: bool,
    ) -> MoveData {
        MoveData::ChangeInfo(PlayerTransform {
            name: name.to_string(),
            x,
            y,
            rotation,
            health,
            is_shot,
        })
    }

    fn count_matching(events: &[Outbound], predicate: impl Fn(&Message) -> bool) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, Outbound::Broadcast(m) if predicate(m)))
            .count()
    }

    fn winners(events: &[Outbound]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                Outbound::Broadcast(Message::GameWon { name }) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Registers players lined up along y = 0, 100 units apart
    fn game_with_players(names: &[&str], now: Instant) -> GameState {
        let mut game = GameState::new();
        for (i, name) in names.iter().enumerate() {
            game.handle_join(name, addr(9000 + i as u16), now);
            game.handle_move(change_info(name, i as f32 * 100.0, 0.0, 0.0, MAX_HEALTH, false), now);
        }
        game
    }

    /// Puts a projectile owned by `owner` directly on top of `target`
    fn shoot_at(game: &mut GameState, owner: &str, target: &str, now: Instant) {
        let position = game.sessions.get(target).unwrap().position;
        game.projectiles.spawn(owner, Vector2::new(position.x - 20.0, position.y), 0.0, now);
    }

    #[test]
    fn test_join_replies_to_requester_only() {
        let now = Instant::now();
        let mut game = GameState::new();

        let events = game.handle_join("alice", addr(1), now);
        assert_eq!(
            events,
            vec![Outbound::Reply {
                addr: addr(1),
                message: Message::NameAccepted
            }]
        );

        let events = game.handle_join("alice", addr(2), now);
        assert_eq!(
            events,
            vec![Outbound::Reply {
                addr: addr(2),
                message: Message::NameTaken
            }]
        );
        assert_eq!(game.sessions.len(), 1);
        assert_eq!(game.sessions.get("alice").unwrap().addr, addr(1));
    }

    #[test]
    fn test_move_is_echoed_with_normalized_rotation() {
        let now = Instant::now();
        let mut game = GameState::new();
        game.handle_join("alice", addr(1), now);

        let events = game.handle_move(change_info("alice", 5.0, 6.0, 370.0, 100, false), now);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Outbound::Broadcast(Message::Move {
                source: Some(Source::Client),
                data: MoveData::ChangeInfo(echo),
            }) => {
                assert_eq!(echo.name, "alice");
                assert_eq!(echo.rotation, 10.0);
                assert_eq!((echo.x, echo.y), (5.0, 6.0));
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_move_for_unknown_player_is_silent() {
        let mut game = GameState::new();
        let events = game.handle_move(change_info("ghost", 0.0, 0.0, 0.0, 100, true), Instant::now());
        assert!(events.is_empty());
        assert!(game.projectiles.is_empty());
    }

    #[test]
    fn test_shot_spawns_projectile() {
        let now = Instant::now();
        let mut game = GameState::new();
        game.handle_join("alice", addr(1), now);

        let events = game.handle_move(change_info("alice", 400.0, 300.0, 0.0, 100, true), now);
        assert_eq!(events.len(), 2);
        match &events[1] {
            Outbound::Broadcast(Message::Shoot(ShootEvent::Add(bullet))) => {
                assert_eq!(bullet.owner, "alice");
                assert_eq!(bullet.x, 420.0);
                assert_eq!(bullet.y, 300.0);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert_eq!(game.projectiles.len(), 1);
    }

    #[test]
    fn test_heartbeat_produces_no_broadcast() {
        let t0 = Instant::now();
        let mut game = GameState::new();
        game.handle_join("alice", addr(1), t0);

        let later = t0 + Duration::from_millis(4000);
        let events = game.handle_move(
            MoveData::Heartbeat {
                name: "alice".to_string(),
            },
            later,
        );
        assert!(events.is_empty());
        assert_eq!(game.sessions.get("alice").unwrap().last_heartbeat, later);
    }

    #[test]
    fn test_client_cannot_delete_players() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob"], now);
        let events = game.handle_move(
            MoveData::DeletePlayer {
                name: "bob".to_string(),
            },
            now,
        );
        assert!(events.is_empty());
        assert_eq!(game.sessions.len(), 2);
    }

    #[test]
    fn test_unexpected_message_is_ignored() {
        let mut game = GameState::new();
        let events = game.handle_message(Message::game_won("mallory"), addr(1), Instant::now());
        assert!(events.is_empty());
        assert!(!game.winner_declared());
    }

    #[test]
    fn test_projectile_tick_updates_and_expires() {
        let t0 = Instant::now();
        let lifetime = Duration::from_millis(2000);
        let mut game = GameState::new();
        let old = game.projectiles.spawn("alice", Vector2::default(), 0.0, t0).id;
        let young = game
            .projectiles
            .spawn("alice", Vector2::default(), 0.0, t0 + Duration::from_millis(1000))
            .id;

        let events = game.projectile_tick(t0 + Duration::from_millis(2100), lifetime);
        assert_eq!(
            events[0],
            Outbound::Broadcast(Message::Shoot(ShootEvent::Remove { id: old }))
        );
        match &events[1] {
            Outbound::Broadcast(Message::Shoot(ShootEvent::Update(bullet))) => {
                assert_eq!(bullet.id, young);
                assert_eq!(bullet.x, 30.0);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_hit_applies_damage_and_removes_projectile() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob"], now);
        shoot_at(&mut game, "alice", "bob", now);
        let id = game.projectiles.iter().next().unwrap().id;

        let events = game.collision_tick();

        assert_eq!(game.sessions.get("bob").unwrap().health, 90);
        assert!(game.projectiles.is_empty());
        assert_eq!(events.len(), 2);
        match &events[0] {
            Outbound::Broadcast(Message::Move {
                source: Some(Source::Server),
                data: MoveData::ChangeInfo(update),
            }) => {
                assert_eq!(update.name, "bob");
                assert_eq!(update.health, 90);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
        assert_eq!(
            events[1],
            Outbound::Broadcast(Message::Shoot(ShootEvent::Remove { id }))
        );
        assert_eq!(game.sessions.get("alice").unwrap().score, 1);
    }

    #[test]
    fn test_projectile_never_hits_owner() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob"], now);
        shoot_at(&mut game, "alice", "alice", now);

        assert!(game.collision_tick().is_empty());
        assert_eq!(game.sessions.get("alice").unwrap().health, MAX_HEALTH);
        assert_eq!(game.projectiles.len(), 1);
    }

    #[test]
    fn test_miss_outside_radius() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob"], now);
        // Bob stands at (100, 0); this projectile spawns at (80, 0), exactly on the radius
        game.projectiles.spawn("alice", Vector2::new(60.0, 0.0), 0.0, now);

        assert!(game.collision_tick().is_empty());
        assert_eq!(game.sessions.get("bob").unwrap().health, MAX_HEALTH);
    }

    #[test]
    fn test_first_player_in_join_order_takes_the_hit() {
        let now = Instant::now();
        let mut game = GameState::new();
        for (i, name) in ["alice", "bob", "carol"].iter().enumerate() {
            game.handle_join(name, addr(9000 + i as u16), now);
        }
        game.handle_move(change_info("alice", 0.0, 500.0, 0.0, 100, false), now);
        game.handle_move(change_info("bob", 100.0, 0.0, 0.0, 100, false), now);
        game.handle_move(change_info("carol", 105.0, 0.0, 0.0, 100, false), now);
        game.projectiles.spawn("alice", Vector2::new(82.0, 0.0), 0.0, now);

        game.collision_tick();

        assert_eq!(game.sessions.get("bob").unwrap().health, 90);
        assert_eq!(game.sessions.get("carol").unwrap().health, MAX_HEALTH);
        assert!(game.projectiles.is_empty());
    }

    #[test]
    fn test_elimination_in_two_player_game_declares_winner() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob"], now);
        game.handle_move(change_info("bob", 100.0, 0.0, 0.0, 10, false), now);
        shoot_at(&mut game, "alice", "bob", now);

        let events = game.collision_tick();

        assert!(!game.sessions.get("bob").unwrap().alive);
        assert_eq!(
            events[0],
            Outbound::Broadcast(Message::player_eliminated("bob"))
        );
        assert_eq!(winners(&events), vec!["alice".to_string()]);
        assert!(game.winner_declared());
        assert_eq!(
            count_matching(&events, |m| matches!(m, Message::Move { .. })),
            0
        );
    }

    #[test]
    fn test_elimination_in_three_player_game_has_no_winner() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob", "carol"], now);
        game.handle_move(change_info("bob", 100.0, 0.0, 0.0, 10, false), now);
        shoot_at(&mut game, "alice", "bob", now);

        let events = game.collision_tick();

        assert_eq!(
            count_matching(&events, |m| matches!(m, Message::PlayerEliminated { .. })),
            1
        );
        assert!(winners(&events).is_empty());
        assert!(!game.winner_declared());
    }

    #[test]
    fn test_winner_is_announced_once() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob", "carol"], now);
        game.handle_move(change_info("bob", 100.0, 0.0, 0.0, 10, false), now);
        game.handle_move(change_info("carol", 200.0, 0.0, 0.0, 10, false), now);
        shoot_at(&mut game, "alice", "bob", now);
        shoot_at(&mut game, "alice", "carol", now);

        let events = game.collision_tick();
        assert_eq!(winners(&events), vec!["alice".to_string()]);

        // A late joiner who is then eliminated leaves alice alone again
        game.handle_join("dave", addr(9100), now);
        game.handle_move(change_info("dave", 300.0, 0.0, 0.0, 10, false), now);
        shoot_at(&mut game, "alice", "dave", now);
        let events = game.collision_tick();
        assert_eq!(
            count_matching(&events, |m| matches!(m, Message::PlayerEliminated { .. })),
            1
        );
        assert_eq!(game.sessions.sole_survivor(), Some("alice"));
        assert!(winners(&events).is_empty());
    }

    #[test]
    fn test_solo_player_never_wins() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice"], now);
        let events = game.handle_move(change_info("alice", 0.0, 0.0, 0.0, 0, false), now);

        assert_eq!(
            count_matching(&events, |m| matches!(m, Message::PlayerEliminated { .. })),
            1
        );
        assert!(winners(&events).is_empty());
    }

    #[test]
    fn test_corpse_still_absorbs_projectiles() {
        let now = Instant::now();
        let mut game = game_with_players(&["alice", "bob", "carol"], now);
        game.sessions.apply_damage("bob", MAX_HEALTH);
        shoot_at(&mut game, "carol", "bob", now);

        let events = game.collision_tick();
        assert!(game.projectiles.is_empty());
        assert_eq!(
            count_matching(&events, |m| matches!(m, Message::PlayerEliminated { .. })),
            0
        );
        assert_eq!(game.sessions.get("bob").unwrap().health, 0);
    }

    #[test]
    fn test_heartbeat_sweep_announces_each_eviction() {
        let t0 = Instant::now();
        let timeout = Duration::from_millis(5000);
        let mut game = game_with_players(&["alice", "bob"], t0);
        game.sessions.heartbeat("bob", t0 + Duration::from_millis(3000));

        assert!(game
            .heartbeat_sweep(t0 + Duration::from_millis(4999), timeout)
            .is_empty());

        let events = game.heartbeat_sweep(t0 + Duration::from_millis(5001), timeout);
        assert_eq!(
            events,
            vec![Outbound::Broadcast(Message::delete_player("alice"))]
        );
        assert_eq!(game.sessions.len(), 1);
    }

    #[test]
    fn test_end_to_end_join_shoot_hit() {
        let now = Instant::now();
        let mut game = GameState::new();

        let accepted = game.handle_message(
            Message::Join {
                name: "alice".to_string(),
            },
            addr(1),
            now,
        );
        assert_eq!(
            accepted[0],
            Outbound::Reply {
                addr: addr(1),
                message: Message::NameAccepted
            }
        );

        let taken = game.handle_message(
            Message::Join {
                name: "alice".to_string(),
            },
            addr(2),
            now,
        );
        assert_eq!(
            taken[0],
            Outbound::Reply {
                addr: addr(2),
                message: Message::NameTaken
            }
        );

        game.handle_join("bob", addr(2), now);
        game.handle_move(change_info("bob", 425.0, 300.0, 180.0, 100, false), now);
        game.handle_move(change_info("alice", 400.0, 300.0, 0.0, 100, true), now);
        assert_eq!(game.projectiles.iter().next().unwrap().owner, "alice");

        let events = game.collision_tick();
        assert_eq!(game.sessions.get("bob").unwrap().health, 90);
        assert_eq!(
            count_matching(&events, |m| matches!(
                m,
                Message::Move {
                    data: MoveData::ChangeInfo(_),
                    ..
                }
            )),
            1
        );
        assert!(game.projectiles.is_empty());
    }
}
