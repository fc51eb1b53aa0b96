//! Explorer configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;

/// Configuration for an explorer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Node WebSocket endpoint, e.g. `"ws://127.0.0.1:8080/json_rpc"`.
    #[serde(default = "default_node_url")]
    pub node_url: String,
    /// Capacity N of the block window (blocks per page).
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Upper bound for a single node call, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Refresh node info (stable height) after every new live block.
    #[serde(default = "bool_true")]
    pub refresh_info_on_block: bool,
    /// Reconnect backoff starting duration (milliseconds).
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Maximum reconnect backoff (milliseconds).
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_node_url() -> String { "ws://127.0.0.1:8080/json_rpc".into() }
fn default_window_size() -> usize { 20 }
fn default_request_timeout_ms() -> u64 { 10_000 }
fn default_reconnect_initial_ms() -> u64 { 500 }
fn default_reconnect_max_ms() -> u64 { 60_000 }
fn bool_true() -> bool { true }

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            node_url: default_node_url(),
            window_size: default_window_size(),
            request_timeout_ms: default_request_timeout_ms(),
            refresh_info_on_block: true,
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            log: LogConfig::default(),
        }
    }
}

impl ExplorerConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExplorerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExplorerError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ExplorerError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the explorer cannot run with.
    pub fn validate(&self) -> Result<(), ExplorerError> {
        if self.window_size == 0 {
            return Err(ExplorerError::Config("window_size must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ExplorerError::Config("request_timeout_ms must be non-zero".into()));
        }
        if self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(ExplorerError::Config(
                "reconnect_initial_ms exceeds reconnect_max_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Logging settings for the binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Base filter level, e.g. `"info"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Per-crate overrides, e.g. `"dagview-ws" => "debug"`.
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives, e.g. `"info,dagview_core=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}
