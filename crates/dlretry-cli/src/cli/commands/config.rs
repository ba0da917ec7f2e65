//! `dlretry config` – show where the config lives and what it resolves to.

use anyhow::Result;
use dlretry_core::config::{self, DlretryConfig};
use dlretry_core::retry::MaxAttempts;

pub fn run_config(cfg: &DlretryConfig) -> Result<()> {
    let policy = cfg.retry_policy();
    println!("config: {}", config::config_path()?.display());
    match policy.max_attempts {
        MaxAttempts::Limited(n) => println!("max retries: {}", n),
        MaxAttempts::Unbounded => println!("max retries: unbounded"),
    }
    println!("retry delay: {}s", policy.delay_secs);
    println!("connect timeout: {}s", cfg.connect_timeout_secs);
    println!("low-speed abort after: {}s", cfg.low_speed_time_secs);
    Ok(())
}
