//! Control socket: server (during `dlretry get`) and client (for `dlretry stop`).
//! Protocol: one line per command; only "stop" is understood.

use anyhow::{bail, Result};
use dlretry_core::control::{Interrupter, StopToken};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Thread running the download, once it has started.
pub type WorkerSlot = Arc<Mutex<Option<Interrupter>>>;

/// Listens on `path` and, for each "stop" line, raises `stop` and interrupts
/// the worker so a backoff countdown ends immediately. Ignores other lines.
pub fn spawn_stop_listener(
    stop: StopToken,
    worker: WorkerSlot,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    claim_socket_path(&path)?;
    let listener = UnixListener::bind(&path)?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let stop = stop.clone();
                    let worker = Arc::clone(&worker);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            if line.trim() == "stop" {
                                tracing::info!("stop requested via control socket");
                                stop.stop();
                                if let Ok(slot) = worker.lock() {
                                    if let Some(interrupter) = slot.as_ref() {
                                        interrupter.interrupt();
                                    }
                                }
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Fails if another download is listening on `path`; otherwise removes a
/// stale socket file left by one that exited without cleanup.
pub fn claim_socket_path(path: &Path) -> Result<()> {
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        bail!("another download is already listening on {}", path.display());
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Removes the socket file when the download ends.
pub struct SocketGuard(pub PathBuf);

impl Drop for SocketGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Sends "stop\n" to the control socket. Returns false if no download is listening.
pub async fn send_stop(socket_path: &Path) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let mut stream = match tokio::net::UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    tokio::io::AsyncWriteExt::write_all(&mut stream, b"stop\n").await?;
    Ok(true)
}
