//! Server configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! wants to change:
//!
//! ```json
//! { "world_addr": "0.0.0.0:2611", "walk_min_interval_ms": 250 }
//! ```

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use hearthwire_protocol::CipherParameters;
use hearthwire_session::SessionConfig;
use serde::Deserialize;

use crate::HearthwireError;

/// Tunables for one server process (both roles).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Where the login role listens.
    pub login_addr: String,
    /// Where the world role listens.
    pub world_addr: String,
    /// Address put into redirect packets. Defaults to the bound
    /// address of the target listener.
    pub advertise_host: Option<Ipv4Addr>,

    /// Cipher parameters used until a session negotiates its own.
    pub default_cipher: CipherParameters,

    /// Redirect TTL and sweep interval.
    pub session: SessionConfig,

    /// Drop a connection that sends nothing for this long.
    pub idle_timeout_secs: u64,
    /// Discard a dialog left untouched for this long.
    pub dialog_idle_secs: u64,
    /// Autosave an actor at most this often.
    pub autosave_interval_secs: u64,

    /// Minimum spacing between two steps (speed-hack gate).
    pub walk_min_interval_ms: u64,
    /// Minimum spacing between any two combat actions.
    pub global_action_interval_ms: u64,
    /// Minimum spacing between two refresh requests.
    pub refresh_min_interval_ms: u64,
    /// Each of the two pauses while switching maps from the world map.
    pub world_transition_delay_ms: u64,

    /// Upper bound on queued deferred actions per connection.
    pub pending_action_limit: usize,

    /// Shown to a player whose saved record is corrupt.
    pub corrupt_record_message: String,
    /// Shown after entering the world.
    pub welcome_message: String,
}

impl ServerConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, HearthwireError> {
        serde_json::from_str(text)
            .map_err(|e| HearthwireError::Config(e.to_string()))
    }

    /// Reads and parses a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, HearthwireError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            HearthwireError::Config(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn dialog_idle(&self) -> Duration {
        Duration::from_secs(self.dialog_idle_secs)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn walk_min_interval(&self) -> Duration {
        Duration::from_millis(self.walk_min_interval_ms)
    }

    pub fn global_action_interval(&self) -> Duration {
        Duration::from_millis(self.global_action_interval_ms)
    }

    pub fn refresh_min_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_min_interval_ms)
    }

    pub fn world_transition_delay(&self) -> Duration {
        Duration::from_millis(self.world_transition_delay_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            login_addr: "127.0.0.1:2610".to_string(),
            world_addr: "127.0.0.1:2611".to_string(),
            advertise_host: None,
            default_cipher: CipherParameters::default(),
            session: SessionConfig::default(),
            idle_timeout_secs: 60,
            dialog_idle_secs: 300,
            autosave_interval_secs: 120,
            walk_min_interval_ms: 150,
            global_action_interval_ms: 500,
            refresh_min_interval_ms: 500,
            world_transition_delay_ms: 500,
            pending_action_limit: 16,
            corrupt_record_message:
                "Your character record is damaged. Please contact staff."
                    .to_string(),
            welcome_message: "Welcome to Hearthwire.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_partial_keeps_defaults() {
        let config = ServerConfig::from_json_str(
            r#"{ "walk_min_interval_ms": 250, "session": { "redirect_ttl_secs": 5 } }"#,
        )
        .unwrap();

        assert_eq!(config.walk_min_interval_ms, 250);
        assert_eq!(config.session.redirect_ttl_secs, 5);
        assert_eq!(config.dialog_idle_secs, 300);
        assert_eq!(config.default_cipher, CipherParameters::default());
    }

    #[test]
    fn test_from_json_str_invalid_is_config_error() {
        let result = ServerConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(HearthwireError::Config(_))));
    }

    #[test]
    fn test_from_json_file_missing_is_config_error() {
        let result = ServerConfig::from_json_file("/nonexistent/hearthwire.json");
        assert!(matches!(result, Err(HearthwireError::Config(_))));
    }
}
