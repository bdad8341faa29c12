//! Shell configuration.
//!
//! Stored as pretty JSON at `<config dir>/boop/shell.json`, or wherever
//! `BOOP_SHELL_CONFIG` points.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use boop_connection::RetryPolicy;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "BOOP_SHELL_CONFIG";

/// How to start the native backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "boop-backend".into(),
            args: Vec::new(),
        }
    }
}

/// One retry section. `maxAttempts: null` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    pub interval_ms: u64,
    pub max_attempts: Option<u32>,
    #[serde(default = "default_true")]
    pub notify_on_exhaustion: bool,
}

fn default_true() -> bool {
    true
}

impl RetryConfig {
    fn initial() -> Self {
        RetryPolicy::initial_connect().into()
    }

    fn reconnect() -> Self {
        RetryPolicy::reconnect().into()
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts,
            notify_on_exhaustion: self.notify_on_exhaustion,
        }
    }
}

impl From<RetryPolicy> for RetryConfig {
    fn from(p: RetryPolicy) -> Self {
        Self {
            interval_ms: p.interval.as_millis() as u64,
            max_attempts: p.max_attempts,
            notify_on_exhaustion: p.notify_on_exhaustion,
        }
    }
}

fn default_disconnect_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "RetryConfig::initial")]
    pub initial_retry: RetryConfig,
    #[serde(default = "RetryConfig::reconnect")]
    pub reconnect_retry: RetryConfig,
    /// Upper bound for the `disconnect` call and the backend exit on quit.
    #[serde(default = "default_disconnect_timeout_ms")]
    pub disconnect_timeout_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            initial_retry: RetryConfig::initial(),
            reconnect_retry: RetryConfig::reconnect(),
            disconnect_timeout_ms: default_disconnect_timeout_ms(),
        }
    }
}

impl ShellConfig {
    /// Loads the config from its default location. A missing file yields
    /// the defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: ShellConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes the config to its default location.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, &json)?;
        set_permissions_0600(path);

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (name, retry) in [
            ("initialRetry", &self.initial_retry),
            ("reconnectRetry", &self.reconnect_retry),
        ] {
            if retry.max_attempts == Some(0) {
                anyhow::bail!("{name}.maxAttempts must be at least 1 (or null for unbounded)");
            }
        }
        if self.backend.program.trim().is_empty() {
            anyhow::bail!("backend.program must not be empty");
        }
        Ok(())
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

/// Config file location, honouring [`CONFIG_PATH_ENV`].
pub fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(config_base_dir()?.join("boop").join("shell.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config"))
    }
}
