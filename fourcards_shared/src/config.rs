//! Configuration system.
//!
//! Loads client configuration from JSON strings/files. CLI overrides are
//! applied by the binary.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Process identifier of the deployed game.
pub const DEFAULT_PROCESS_ID: &str = "4T8COHVsKeuOa7zgMN8Jy9LhdZxr0MRMPMhP4Ml_JZY";

/// How a submitted message's reply is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadbackStrategy {
    /// Poll the submitted message's own result until it carries messages.
    #[default]
    Confirmed,
    /// Sleep a fixed delay, then read the newest entry of the results listing.
    LatestAfterDelay,
}

/// Root client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Target game process.
    #[serde(default = "default_process_id")]
    pub process_id: String,
    /// Compute unit base URL (dry-runs and results).
    #[serde(default = "default_cu_url")]
    pub cu_url: String,
    /// Messenger unit base URL (signed submissions).
    #[serde(default = "default_mu_url")]
    pub mu_url: String,
    /// Origin used when building invite links.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,
    /// Where the session store lives.
    #[serde(default = "default_session_path")]
    pub session_path: String,
    /// Delay between room polling cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub readback: ReadbackStrategy,
    /// Fixed wait used by [`ReadbackStrategy::LatestAfterDelay`], and the
    /// retry spacing of [`ReadbackStrategy::Confirmed`].
    #[serde(default = "default_readback_delay_ms")]
    pub readback_delay_ms: u64,
    /// Upper bound on waiting for a submitted message's result.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_process_id() -> String {
    DEFAULT_PROCESS_ID.to_string()
}

fn default_cu_url() -> String {
    "https://cu.ao-testnet.xyz".to_string()
}

fn default_mu_url() -> String {
    "https://mu.ao-testnet.xyz".to_string()
}

fn default_app_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_session_path() -> String {
    "fourcards-session.json".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_readback_delay_ms() -> u64 {
    3000
}

fn default_confirm_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            process_id: default_process_id(),
            cu_url: default_cu_url(),
            mu_url: default_mu_url(),
            app_origin: default_app_origin(),
            session_path: default_session_path(),
            poll_interval_ms: default_poll_interval_ms(),
            readback: ReadbackStrategy::default(),
            readback_delay_ms: default_readback_delay_ms(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn readback_delay(&self) -> Duration {
        Duration::from_millis(self.readback_delay_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
