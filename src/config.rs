//! Tool locations, timeouts, and cache lifetimes.
//!
//! Defaults come from the compiled-in tool directory (see `build.rs`) and can
//! be overridden through `CIBTEMPLATE_*` environment variables or CLI flags.

use anyhow::{Context, Result};
use std::env;
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SBIN_DIR: &str = "CIBTEMPLATE_SBIN_DIR";
pub const ENV_HEARTBEAT_MARKER: &str = "CIBTEMPLATE_HEARTBEAT_MARKER";
pub const ENV_TOOL_TIMEOUT: &str = "CIBTEMPLATE_TOOL_TIMEOUT_SECS";
pub const ENV_CACHE_TTL: &str = "CIBTEMPLATE_CACHE_TTL_SECS";

const FALLBACK_SBIN_DIR: &str = "/usr/sbin";
const DEFAULT_HEARTBEAT_MARKER: &str = "/etc/ha.d/resource.d";
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolConfig {
    pub sbin_dir: PathBuf,
    /// Legacy resource directory whose presence enables the `heartbeat` class.
    pub heartbeat_marker: PathBuf,
    pub tool_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            sbin_dir: default_sbin_dir(),
            heartbeat_marker: PathBuf::from(DEFAULT_HEARTBEAT_MARKER),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl ToolConfig {
    /// Defaults with any `CIBTEMPLATE_*` overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = env_override(ENV_SBIN_DIR) {
            config.sbin_dir = PathBuf::from(dir);
        }
        if let Some(marker) = env_override(ENV_HEARTBEAT_MARKER) {
            config.heartbeat_marker = PathBuf::from(marker);
        }
        if let Some(raw) = env_override(ENV_TOOL_TIMEOUT) {
            config.tool_timeout = parse_seconds(ENV_TOOL_TIMEOUT, &raw)?;
        }
        if let Some(raw) = env_override(ENV_CACHE_TTL) {
            config.cache_ttl = parse_seconds(ENV_CACHE_TTL, &raw)?;
        }
        Ok(config)
    }

    pub fn tool_path(&self, name: &str) -> PathBuf {
        self.sbin_dir.join(name)
    }

    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_marker.exists()
    }

    pub fn with_sbin_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.sbin_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_heartbeat_marker(mut self, marker: impl AsRef<Path>) -> Self {
        self.heartbeat_marker = marker.as_ref().to_path_buf();
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

fn default_sbin_dir() -> PathBuf {
    PathBuf::from(option_env!("CIBTEMPLATE_SBIN_HINT").unwrap_or(FALLBACK_SBIN_DIR))
}

fn env_override(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(os)) => Some(os.to_string_lossy().into_owned()),
    }
}

fn parse_seconds(name: &str, raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{name} must be a whole number of seconds, got '{raw}'"))?;
    Ok(Duration::from_secs(secs))
}
