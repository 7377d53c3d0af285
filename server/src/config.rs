//! Timing configuration for the server loops

use shared::{
    COLLISION_TICK_MS, HEARTBEAT_SWEEP_MS, HEARTBEAT_TIMEOUT_MS, PROJECTILE_LIFETIME_MS,
    PROJECTILE_TICK_MS,
};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),
}

/// Periods and timeouts driving the three server timers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Projectile advance, expiry and broadcast
    pub projectile_tick: Duration,
    /// Projectile-vs-player checks; should be much shorter than `projectile_tick`
    pub collision_tick: Duration,
    /// Heartbeat sweep
    pub heartbeat_sweep: Duration,
    pub heartbeat_timeout: Duration,
    pub projectile_lifetime: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            projectile_tick: Duration::from_millis(PROJECTILE_TICK_MS),
            collision_tick: Duration::from_millis(COLLISION_TICK_MS),
            heartbeat_sweep: Duration::from_millis(HEARTBEAT_SWEEP_MS),
            heartbeat_timeout: Duration::from_millis(HEARTBEAT_TIMEOUT_MS),
            projectile_lifetime: Duration::from_millis(PROJECTILE_LIFETIME_MS),
        }
    }
}

impl ServerConfig {
    /// Timer periods must be non-zero; tokio intervals panic otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("projectile tick", self.projectile_tick),
            ("collision tick", self.collision_tick),
            ("heartbeat sweep", self.heartbeat_sweep),
        ];
        for (name, period) in periods {
            if period.is_zero() {
                return Err(ConfigError::ZeroPeriod(name));
            }
        }
        Ok(())
    }
}
