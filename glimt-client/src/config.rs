//! Client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay server settings.
    pub server: ServerConfig,
    /// Session membership.
    pub session: SessionConfig,
    /// Capture cadence when sharing.
    pub capture: CaptureConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Relay server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Relay address. A bare host gets the default port appended.
    pub address: String,
}

/// Session membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session name to join. Required, but usually given on the CLI.
    pub name: String,
    /// Session password; also sets the password when the session is
    /// created by this join.
    pub password: String,
    /// Join the saved session at startup. `-s` on the CLI always joins.
    pub auto_join: bool,
}

/// Capture cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Milliseconds between screen grabs while sharing.
    pub interval_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            capture: CaptureConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            password: String::new(),
            auto_join: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::debug!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("address"));
        assert!(text.contains("interval_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ClientConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.capture.interval_ms, 100);
        assert_eq!(parsed.logging.level, "info");
        assert!(parsed.server.address.is_empty());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: ClientConfig = toml::from_str(
            r#"
            [server]
            address = "relay.example.net:4000"

            [session]
            name = "standup"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.address, "relay.example.net:4000");
        assert_eq!(parsed.session.name, "standup");
        assert_eq!(parsed.session.password, "");
        assert!(parsed.session.auto_join);
        assert_eq!(parsed.capture.interval_ms, 100);
    }
}
