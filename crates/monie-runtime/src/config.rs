//! Runtime configuration.
//!
//! [`RuntimeConfig`] deserializes with per-field defaults and can be read
//! from the process environment with [`RuntimeConfig::from_env`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

/// Settings for an [`IoServer`](crate::server::IoServer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Seconds between heartbeat frames.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Threads in the CPU worker pool.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Run every request on the async runtime, CPU-bound or not.
    #[serde(default)]
    pub disable_worker: bool,

    /// Raw bytes per `asset_chunk` frame (before base64).
    #[serde(default = "default_asset_chunk_size")]
    pub asset_chunk_size: usize,

    /// Poll interval for the parent-process watcher. `None` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_check_interval_ms: Option<u64>,

    /// Plugin base directory.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Assets directory, relative to `base_dir`.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}
fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus / 2).max(2)
}
fn default_asset_chunk_size() -> usize {
    64 * 1024
}
fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_assets_dir() -> PathBuf {
    PathBuf::from("_assets")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            max_workers: default_max_workers(),
            disable_worker: false,
            asset_chunk_size: default_asset_chunk_size(),
            parent_check_interval_ms: None,
            base_dir: default_base_dir(),
            assets_dir: default_assets_dir(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `HEARTBEAT_INTERVAL`, `MAX_WORKERS`,
    /// `DISABLE_WORKER`, `ASSET_CHUNK_SIZE` and `BASE_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("HEARTBEAT_INTERVAL") {
            config.heartbeat_interval_secs = parse_number("HEARTBEAT_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("MAX_WORKERS") {
            config.max_workers = parse_number("MAX_WORKERS", &v)?;
        }
        if let Some(v) = lookup("DISABLE_WORKER") {
            config.disable_worker = matches!(v.trim(), "1" | "true");
        }
        if let Some(v) = lookup("ASSET_CHUNK_SIZE") {
            config.asset_chunk_size = parse_number("ASSET_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("BASE_DIR").filter(|v| !v.is_empty()) {
            config.base_dir = PathBuf::from(v);
        }

        Ok(config)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn parent_check_interval(&self) -> Option<Duration> {
        self.parent_check_interval_ms.map(Duration::from_millis)
    }

    /// Whether CPU-bound requests go to the worker pool.
    pub fn worker_enabled(&self) -> bool {
        !self.disable_worker && self.max_workers > 0
    }

    /// `base_dir` joined with `assets_dir`.
    pub fn assets_path(&self) -> PathBuf {
        self.base_dir.join(&self.assets_dir)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RuntimeError::Config(format!("{key}: '{value}' is not a valid number")))
}
