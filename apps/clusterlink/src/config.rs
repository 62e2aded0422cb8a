//! Configuration management.
//!
//! Reads TOML from `--config <path>` or
//! `~/.config/clusterlink/clusterlink.toml`. Every field has a default, so a
//! missing default file just means default settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use clusterlink_protocol::constants::{COORDINATOR_HOST, COORDINATOR_PORT, POLL_INTERVAL};
use clusterlink_report::DEFAULT_QUEUE_CAPACITY;
use clusterlink_transfer::{CopyConfig, DEFAULT_CHUNK_SIZE, DEFAULT_REPORT_EVERY};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_coordinator_host")]
    pub host: String,
    #[serde(default = "default_coordinator_port")]
    pub port: u16,
    #[serde(default = "default_coordinator_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransferConfig {
    /// Bytes per read; 0 means the default.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Bytes between progress lines; 0 means the default.
    #[serde(default = "default_report_every")]
    pub report_every: u64,
    /// Progress lines buffered ahead of a slow coordinator.
    #[serde(default = "default_progress_queue")]
    pub progress_queue: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_gsutil")]
    pub gsutil: String,
    /// Extra arguments placed before `cp`.
    #[serde(default)]
    pub gsutil_args: Vec<String>,
    #[serde(default)]
    pub fs: FsConfig,
}

/// How the distributed filesystem is reached.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FsConfig {
    Webhdfs {
        #[serde(default = "default_webhdfs_url")]
        url: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default = "default_webhdfs_timeout")]
        timeout_secs: u64,
    },
    Local {
        root: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_monitor_timeout")]
    pub timeout_secs: u64,
}

fn default_coordinator_host() -> String {
    COORDINATOR_HOST.into()
}

fn default_coordinator_port() -> u16 {
    COORDINATOR_PORT
}

fn default_coordinator_timeout() -> u64 {
    30
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_report_every() -> u64 {
    DEFAULT_REPORT_EVERY
}

fn default_progress_queue() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_gsutil() -> String {
    "gsutil".into()
}

fn default_webhdfs_url() -> String {
    "http://hadoop-namenode:50070".into()
}

fn default_webhdfs_timeout() -> u64 {
    30
}

fn default_api_url() -> String {
    "http://hadoop-jobtracker:8088".into()
}

fn default_interval() -> u64 {
    POLL_INTERVAL.as_secs()
}

fn default_monitor_timeout() -> u64 {
    10
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_coordinator_host(),
            port: default_coordinator_port(),
            timeout_secs: default_coordinator_timeout(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            report_every: default_report_every(),
            progress_queue: default_progress_queue(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            gsutil: default_gsutil(),
            gsutil_args: Vec::new(),
            fs: FsConfig::default(),
        }
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::Webhdfs {
            url: default_webhdfs_url(),
            user: None,
            timeout_secs: default_webhdfs_timeout(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            interval_secs: default_interval(),
            timeout_secs: default_monitor_timeout(),
        }
    }
}

/// Whole seconds, zero raised to one.
pub fn at_least_one_sec(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

impl CoordinatorConfig {
    pub fn timeout(&self) -> Duration {
        at_least_one_sec(self.timeout_secs)
    }
}

impl TransferConfig {
    /// Engine settings, zeros replaced by defaults.
    pub fn copy_config(&self) -> CopyConfig {
        CopyConfig {
            chunk_size: self.chunk_size,
            report_every: self.report_every,
        }
        .normalized()
    }
}

impl MonitorConfig {
    /// Poll interval; never shorter than one second.
    pub fn interval(&self) -> Duration {
        at_least_one_sec(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        at_least_one_sec(self.timeout_secs)
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => {
                tracing::debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parses TOML text.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config =
            Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// `$HOME/.config/clusterlink/clusterlink.toml`, if `HOME` is set.
pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("clusterlink")
            .join("clusterlink.toml"),
    )
}
