//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::grace::DEFAULT_GRACE_PERIOD;
use crate::game::RoomSettings;
use crate::util::time::tick_duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Shared secret for identity token verification
    pub jwt_secret: String,
    /// Allowed client origins for CORS, comma-separated. CORS is off when unset.
    pub client_origin: Option<String>,

    /// Match results endpoint. Results are only logged when unset.
    pub results_url: Option<String>,
    pub results_api_key: Option<String>,

    pub game: GameSettings,
}

/// Simulation timing knobs
#[derive(Clone, Debug, PartialEq)]
pub struct GameSettings {
    pub tick_interval: Duration,
    pub grace_period: Duration,
    /// Broadcast every Nth tick
    pub snapshot_every_ticks: u32,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            tick_interval: tick_duration(),
            grace_period: DEFAULT_GRACE_PERIOD,
            snapshot_every_ticks: 1,
        }
    }
}

impl GameSettings {
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            tick_period: self.tick_interval,
            grace_period: self.grace_period,
            snapshot_interval: self.snapshot_every_ticks,
            ..Default::default()
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = GameSettings::default();
        let game = GameSettings {
            tick_interval: parse_var(&lookup, "TICK_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            grace_period: parse_var(&lookup, "GRACE_PERIOD_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
            snapshot_every_ticks: parse_var(&lookup, "SNAPSHOT_EVERY_TICKS")?
                .unwrap_or(defaults.snapshot_every_ticks),
        };

        if game.tick_interval.is_zero() {
            return Err(ConfigError::Invalid("TICK_INTERVAL_MS"));
        }
        if game.snapshot_every_ticks == 0 {
            return Err(ConfigError::Invalid("SNAPSHOT_EVERY_TICKS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            jwt_secret: lookup("JWT_SECRET")
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing("JWT_SECRET"))?,
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),

            results_url: lookup("RESULTS_URL").filter(|s| !s.is_empty()),
            results_api_key: lookup("RESULTS_API_KEY").filter(|s| !s.is_empty()),

            game,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.server_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_level, "info");
        assert!(config.client_origin.is_none());
        assert!(config.results_url.is_none());
        assert_eq!(config.game, GameSettings::default());
        assert_eq!(config.game.tick_interval, Duration::from_millis(5));
        assert_eq!(config.game.grace_period, Duration::from_secs(10));
    }

    #[test]
    fn test_port_wins_over_server_addr() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:7000"),
        ])
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
        assert!(matches!(
            load(&[("JWT_SECRET", "")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn test_game_overrides() {
        let config = load(&[
            ("JWT_SECRET", "s3cret"),
            ("TICK_INTERVAL_MS", "16"),
            ("GRACE_PERIOD_SECS", "30"),
            ("SNAPSHOT_EVERY_TICKS", "3"),
        ])
        .unwrap();

        let room = config.game.room_settings();
        assert_eq!(room.tick_period, Duration::from_millis(16));
        assert_eq!(room.grace_period, Duration::from_secs(30));
        assert_eq!(room.snapshot_interval, 3);
        assert!(room.seed.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TICK_INTERVAL_MS", "fast")]),
            Err(ConfigError::Invalid("TICK_INTERVAL_MS"))
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("TICK_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid("TICK_INTERVAL_MS"))
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("SNAPSHOT_EVERY_TICKS", "0")]),
            Err(ConfigError::Invalid("SNAPSHOT_EVERY_TICKS"))
        ));
        assert!(matches!(
            load(&[("JWT_SECRET", "s"), ("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
