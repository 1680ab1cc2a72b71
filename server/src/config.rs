use std::time::Duration;

pub use minigolf_shared::config::PhysicsConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    /// A match without inbound activity for this long is stopped and removed
    pub idle_timeout_secs: u64,
    pub idle_sweep_secs: u64,
    /// Frames a slow player may fall behind before being disconnected
    pub outbound_capacity: usize,
    /// Live matches allowed before joins to unknown game ids are refused
    pub max_games: usize,
    /// Directory of saved maps; in-memory storage when unset
    pub map_dir: Option<String>,
    /// Seed for game ids and tokens; entropy when unset
    pub rng_seed: Option<u64>,
    pub physics: PhysicsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9001".to_string(),
            tick_rate_hz: 60,
            idle_timeout_secs: 30 * 60,
            idle_sweep_secs: 60,
            outbound_capacity: 256,
            max_games: 256,
            map_dir: None,
            rng_seed: None,
            physics: PhysicsConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl ServerConfig {
    /// Defaults overridden by `MINIGOLF_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: env_parse("MINIGOLF_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            tick_rate_hz: env_parse("MINIGOLF_TICK_RATE").unwrap_or(defaults.tick_rate_hz),
            idle_timeout_secs: env_parse("MINIGOLF_IDLE_TIMEOUT_SECS")
                .unwrap_or(defaults.idle_timeout_secs),
            idle_sweep_secs: env_parse("MINIGOLF_IDLE_SWEEP_SECS")
                .unwrap_or(defaults.idle_sweep_secs),
            outbound_capacity: defaults.outbound_capacity,
            max_games: env_parse("MINIGOLF_MAX_GAMES").unwrap_or(defaults.max_games),
            map_dir: std::env::var("MINIGOLF_MAP_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .or(defaults.map_dir),
            rng_seed: env_parse("MINIGOLF_RNG_SEED").or(defaults.rng_seed),
            physics: defaults.physics,
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.idle_timeout_secs == 0 {
            return Err("idle_timeout_secs must be > 0".to_string());
        }
        if self.idle_sweep_secs == 0 {
            return Err("idle_sweep_secs must be > 0".to_string());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be > 0".to_string());
        }
        if self.max_games == 0 {
            return Err("max_games must be > 0".to_string());
        }
        self.physics.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_invalid() {
        let config = ServerConfig {
            tick_rate_hz: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_games_invalid() {
        let config = ServerConfig {
            max_games: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_physics_fails_validation() {
        let mut config = ServerConfig::default();
        config.physics.restitution = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tick_duration_matches_rate() {
        let config = ServerConfig::default();
        let d = config.tick_duration();
        assert!((d.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }
}
