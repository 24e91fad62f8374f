//! Timing and sizing knobs, loaded from an optional TOML file with defaults
//! matching spec §6's literal constants.
//!
//! Follows `breakpoint-server::config`'s load-then-override shape: a
//! `Default` impl carries the spec's constants, `Config::load` reads
//! `contact.toml` when present (path overridable via `CONTACT_CONFIG`) and
//! falls back to defaults on any read/parse failure rather than failing the
//! process.

use serde::Deserialize;
use std::time::Duration;

/// Game-rule timing and sizing constants (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds a disconnected player's seat is held before cleanup reclaims it.
    pub grace_window_secs: u64,
    /// Seconds a cleanup task waits before executing its scheduled sweep.
    pub cleanup_delay_secs: u64,
    /// Seconds between a contact offer being made and it auto-resolving.
    pub contact_window_secs: u64,
    /// Seconds a room's word-guessing round runs before timing out.
    pub game_time_limit_secs: u64,
    /// Number of players a room seats before it is considered full.
    pub players_per_room: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grace_window_secs: 7,
            cleanup_delay_secs: 5,
            contact_window_secs: 5,
            game_time_limit_secs: 300,
            players_per_room: 3,
        }
    }
}

impl Config {
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    pub fn contact_window(&self) -> Duration {
        Duration::from_secs(self.contact_window_secs)
    }

    pub fn game_time_limit(&self) -> Duration {
        Duration::from_secs(self.game_time_limit_secs)
    }

    /// Read `CONTACT_CONFIG` (default `contact.toml`) if present, otherwise
    /// fall back to [`Config::default`]. Never fails the process: a missing
    /// or unparsable file just means defaults apply.
    pub fn load() -> Self {
        let path = std::env::var("CONTACT_CONFIG").unwrap_or_else(|_| "contact.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    tracing::info!(%path, "loaded configuration");
                    config
                },
                Err(error) => {
                    tracing::warn!(%path, %error, "failed to parse config file, using defaults");
                    Config::default()
                },
            },
            Err(_) => {
                tracing::info!(%path, "no config file found, using defaults");
                Config::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.grace_window_secs, 7);
        assert_eq!(config.cleanup_delay_secs, 5);
        assert_eq!(config.contact_window_secs, 5);
        assert_eq!(config.game_time_limit_secs, 300);
        assert_eq!(config.players_per_room, 3);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        unsafe {
            std::env::set_var("CONTACT_CONFIG", "/nonexistent/contact.toml");
        }
        let config = Config::load();
        assert_eq!(config.players_per_room, Config::default().players_per_room);
        unsafe {
            std::env::remove_var("CONTACT_CONFIG");
        }
    }
}
