use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::retry::{MaxAttempts, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};

/// Retry parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after recoverable failures.
    pub max_attempts: u32,
    /// Ignore `max_attempts` and retry forever.
    #[serde(default)]
    pub unbounded: bool,
    /// Seconds to count down between attempts (0 = no delay).
    pub delay_secs: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unbounded: false,
            delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let max_attempts = if cfg.unbounded {
            MaxAttempts::Unbounded
        } else {
            MaxAttempts::Limited(cfg.max_attempts)
        };
        RetryPolicy::new(max_attempts, cfg.delay_secs)
    }
}

/// Global configuration loaded from `~/.config/dlretry/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlretryConfig {
    /// Connect timeout for each attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Abort an attempt when throughput stays below 1 KiB/s for this long.
    pub low_speed_time_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional control socket path (default: XDG state dir).
    #[serde(default)]
    pub control_socket: Option<PathBuf>,
}

impl Default for DlretryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            low_speed_time_secs: 60,
            retry: None,
            control_socket: None,
        }
    }
}

impl DlretryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryPolicy::from)
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlretry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DlretryConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DlretryConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DlretryConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = DlretryConfig::default();
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.low_speed_time_secs, 60);
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = DlretryConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DlretryConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.connect_timeout_secs, cfg.connect_timeout_secs);
        assert_eq!(parsed.low_speed_time_secs, cfg.low_speed_time_secs);
        assert!(parsed.retry.is_none());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            connect_timeout_secs = 10
            low_speed_time_secs = 20

            [retry]
            max_attempts = 2
            delay_secs = 0
        "#;
        let cfg: DlretryConfig = toml::from_str(toml).unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, MaxAttempts::Limited(2));
        assert_eq!(policy.delay_secs, 0);
        assert!(cfg.control_socket.is_none());
    }

    #[test]
    fn config_toml_unbounded() {
        let toml = r#"
            connect_timeout_secs = 10
            low_speed_time_secs = 20
            control_socket = "/tmp/dlretry.sock"

            [retry]
            max_attempts = 2
            unbounded = true
            delay_secs = 7
        "#;
        let cfg: DlretryConfig = toml::from_str(toml).unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, MaxAttempts::Unbounded);
        assert_eq!(policy.delay_secs, 7);
        assert_eq!(
            cfg.control_socket.as_deref(),
            Some(std::path::Path::new("/tmp/dlretry.sock"))
        );
    }
}
