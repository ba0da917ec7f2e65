//! `dlretry stop` – ask a running download to stop.

use anyhow::Result;
use dlretry_core::config::DlretryConfig;

use crate::cli::control_socket;

pub async fn run_stop(cfg: &DlretryConfig) -> Result<()> {
    let path = match &cfg.control_socket {
        Some(p) => p.clone(),
        None => dlretry_core::control::default_control_socket_path()?,
    };
    if control_socket::send_stop(&path).await? {
        println!("Stop requested");
    } else {
        println!("No running download");
    }
    Ok(())
}
