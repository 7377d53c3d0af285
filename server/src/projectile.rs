//! Projectile spawning, movement and expiry
//!
//! Projectiles fly in a straight line at a fixed distance per physics tick.
//! Movement is not scaled by wall-clock time; ticks are treated as uniform.

use shared::{BulletState, Vector2, PROJECTILE_SPAWN_OFFSET, PROJECTILE_SPEED};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A live projectile
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Unique for the lifetime of the process, never reused
    pub id: u64,
    pub position: Vector2,
    /// Unit vector
    pub direction: Vector2,
    /// Name of the shooter; a projectile never hits its owner
    pub owner: String,
    /// Monotonic creation time used for expiry
    pub created_at: Instant,
    /// Epoch milliseconds reported to clients
    pub created_time: u64,
}

impl Projectile {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn to_bullet_state(&self) -> BulletState {
        BulletState {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            direction: self.direction,
            owner: self.owner.clone(),
            created_time: self.created_time,
        }
    }
}

/// Owns every live projectile and the id counter
#[derive(Debug, Default)]
pub struct ProjectileManager {
    projectiles: Vec<Projectile>,
    next_id: u64,
}

impl ProjectileManager {
    pub fn new() -> Self {
        Self {
            projectiles: Vec::new(),
            next_id: 0,
        }
    }

    /// Fires a projectile from `origin` along `rotation_degrees`
    ///
    /// The projectile starts a short distance ahead of the shooter so it does
    /// not overlap them on the first collision pass.
    pub fn spawn(
        &mut self,
        owner: &str,
        origin: Vector2,
        rotation_degrees: f32,
        now: Instant,
    ) -> &Projectile {
        let direction = Vector2::from_degrees(rotation_degrees);
        let id = self.next_id;
        self.next_id += 1;

        self.projectiles.push(Projectile {
            id,
            position: origin.add(&direction.scale(PROJECTILE_SPAWN_OFFSET)),
            direction,
            owner: owner.to_string(),
            created_at: now,
            created_time: epoch_millis(),
        });
        &self.projectiles[self.projectiles.len() - 1]
    }

    /// Moves every projectile one tick along its direction
    pub fn advance_all(&mut self) {
        for projectile in &mut self.projectiles {
            projectile.position = projectile
                .position
                .add(&projectile.direction.scale(PROJECTILE_SPEED));
        }
    }

    /// Removes projectiles older than `lifetime` and returns their ids
    pub fn expire_older_than(&mut self, now: Instant, lifetime: Duration) -> Vec<u64> {
        let mut expired = Vec::new();
        self.projectiles.retain(|projectile| {
            if projectile.age(now) > lifetime {
                expired.push(projectile.id);
                false
            } else {
                true
            }
        });
        expired
    }

    /// Removes a projectile by id. Returns true if it was live.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.projectiles.len();
        self.projectiles.retain(|p| p.id != id);
        self.projectiles.len() != before
    }

    /// Live projectiles in spawn order
    ///
    /// The collision pass walks this order, so older projectiles resolve
    /// their hits first.
    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    /// Looks up a live projectile by id
    ///
    /// Returns None once the projectile has expired or hit someone.
    pub fn get(&self, id: u64) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.id == id)
    }

    /// Number of projectiles currently in flight
    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
