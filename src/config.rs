use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Tuning knobs for the wire core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Ceiling on concurrent connections; accepts past it are rejected.
    pub max_connections: usize,
    /// Per-connection inactivity deadline.
    pub idle_timeout_ms: u64,
    /// Fixed size of each inbound and outbound buffer. A message head must
    /// fit in one buffer.
    pub buffer_capacity_bytes: usize,
    /// OS-level pending-accept queue depth.
    pub accept_backlog: u32,
    /// How long shutdown waits for in-flight connections to drain.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_connections: 1024,
            idle_timeout_ms: 30_000,
            buffer_capacity_bytes: 16 * 1024,
            accept_backlog: 128,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Config {
    /// Loads configuration from the file named by `FERRITE_CONFIG`,
    /// falling back to defaults when the variable is unset.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("FERRITE_CONFIG") {
            Ok(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("read config file {path}"))?;
                Self::from_yaml(&text)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parses a YAML document; an empty document yields the defaults.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("parse YAML configuration")
    }
}
