//! `dlretry get <url>` – download one URL through the retry loop.

use anyhow::{Context, Result};
use dlretry_core::config::DlretryConfig;
use dlretry_core::control::{self, StopToken};
use dlretry_core::fetch::{FetchTarget, ProxySettings};
use dlretry_core::retry::{MaxAttempts, Retrier, RetryPolicy};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use crate::cli::control_socket::{self, SocketGuard, WorkerSlot};
use crate::cli::job::{default_output_name, parse_credentials, CliJob};
use crate::cli::GetArgs;

pub async fn run_get(cfg: &DlretryConfig, args: GetArgs) -> Result<()> {
    let policy = policy_for(cfg, &args);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_name(&args.url).into());
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&output)
        .with_context(|| format!("cannot open {}", output.display()))?;

    let mut target = FetchTarget::new(&args.url).with_config(cfg);
    if let Some(proxy) = &args.proxy {
        target.proxy = Some(ProxySettings {
            url: proxy.clone(),
            credentials: None,
        });
    }
    let credentials = args
        .proxy_user
        .clone()
        .or_else(|| std::env::var("DLRETRY_PROXY_USER").ok())
        .map(|s| parse_credentials(&s))
        .transpose()?;

    let stop = StopToken::new();
    let worker: WorkerSlot = Arc::new(Mutex::new(None));
    let socket_path = match &cfg.control_socket {
        Some(p) => p.clone(),
        None => control::default_control_socket_path()?,
    };
    control_socket::claim_socket_path(&socket_path)?;
    let _guard = match control_socket::spawn_stop_listener(stop.clone(), Arc::clone(&worker), &socket_path) {
        Ok(_) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(SocketGuard(socket_path))
        }
        Err(e) => {
            tracing::warn!("control socket unavailable: {:#}", e);
            None
        }
    };

    let job = CliJob::new(target, file, stop.clone(), policy, args.yes, credentials);
    tracing::info!(url = %args.url, output = %output.display(), ?policy, "starting download");

    let result = tokio::task::spawn_blocking(move || {
        let me = control::interrupter();
        if let Ok(mut slot) = worker.lock() {
            *slot = Some(me.clone());
        }
        let mut job = job;
        let result = Retrier::new(policy, &stop).run(&mut job);
        if let Ok(mut slot) = worker.lock() {
            *slot = None;
        }
        // Pool threads are reused; leave this one clean.
        me.clear();
        result.map(|report| (report, job.target.url))
    })
    .await?;

    let (report, final_url) = result?;
    if report.restarted {
        println!("Server ignored the resume request; downloaded from the start");
    }
    println!(
        "Saved {} ({} bytes this run) from {}",
        output.display(),
        report.bytes_written,
        final_url
    );
    Ok(())
}

/// Config policy with command-line overrides applied.
fn policy_for(cfg: &DlretryConfig, args: &GetArgs) -> RetryPolicy {
    let mut policy = cfg.retry_policy();
    if let Some(delay) = args.delay {
        policy.delay_secs = delay;
    }
    if args.unbounded {
        policy.max_attempts = MaxAttempts::Unbounded;
    } else if let Some(n) = args.retries {
        policy.max_attempts = MaxAttempts::Limited(n);
    }
    policy
}
