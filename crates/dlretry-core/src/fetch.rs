//! Single-stream HTTP GET attempt with resume, for use as a retry job's attempt.
//!
//! Redirects are never followed here; the response status is translated
//! through [`check_status`] so the retry loop sees `Moved`, `ProxyAuth`, etc.
//! Only 2xx bodies reach the file.

use crate::config::DlretryConfig;
use crate::control::{self, StopToken};
use crate::retry::{check_status, AttemptError};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

/// Proxy to send requests through.
#[derive(Debug, Clone, Default)]
pub struct ProxySettings {
    /// Proxy URL; empty means the one libcurl picks from the environment.
    pub url: String,
    /// `(user, password)` installed after a proxy challenge.
    pub credentials: Option<(String, String)>,
}

/// What one attempt fetches and how.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub proxy: Option<ProxySettings>,
    pub connect_timeout: Duration,
    /// Abort when throughput stays below 1 KiB/s for this long.
    pub low_speed_time: Duration,
}

impl FetchTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            proxy: None,
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
        }
    }

    /// Take timeouts from the loaded config.
    pub fn with_config(mut self, cfg: &DlretryConfig) -> Self {
        self.connect_timeout = Duration::from_secs(cfg.connect_timeout_secs);
        self.low_speed_time = Duration::from_secs(cfg.low_speed_time_secs);
        self
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    pub status: u32,
    /// Bytes written by this attempt (not counting earlier partial data).
    pub bytes_written: u64,
    /// True if the server ignored the resume range and the file was rewritten from 0.
    pub restarted: bool,
}

/// Performs one GET of `target`, appending to `file` from its current length.
///
/// A 200 answer to a resume request truncates the file first. The transfer is
/// aborted when `stop` is raised or the thread is interrupted; that is
/// reported as `AttemptError::Interrupted`.
pub fn fetch_to_file(
    target: &FetchTarget,
    file: &mut File,
    stop: &StopToken,
) -> Result<FetchReport, AttemptError> {
    let resume_from = file.metadata()?.len();
    file.seek(SeekFrom::End(0))?;

    let mut easy = curl::easy::Easy::new();
    easy.url(&target.url)?;
    easy.follow_location(false)?;
    easy.connect_timeout(target.connect_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(target.low_speed_time)?;
    if resume_from > 0 {
        // Not CURLOPT_RESUME_FROM: libcurl fails that on a 200 reply, and a 200 must restart the file.
        easy.range(&format!("{}-", resume_from))?;
    }
    if let Some(proxy) = &target.proxy {
        // Empty url: keep libcurl's environment proxy and only add credentials.
        if !proxy.url.is_empty() {
            easy.proxy(&proxy.url)?;
        }
        if let Some((user, password)) = &proxy.credentials {
            easy.proxy_username(user)?;
            easy.proxy_password(password)?;
        }
    }

    let mut list = curl::easy::List::new();
    for (k, v) in &target.headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !target.headers.is_empty() {
        easy.http_headers(list)?;
    }

    let status: Cell<Option<u32>> = Cell::new(None);
    let location: RefCell<Option<String>> = RefCell::new(None);
    let range_start: Cell<Option<u64>> = Cell::new(None);
    let mut written = 0u64;
    let mut restarted = false;
    let mut write_error: Option<std::io::Error> = None;
    let mut stopped = false;
    let mut misplaced = false;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = std::str::from_utf8(data) {
                if let Some(code) = parse_status_line(line) {
                    // New response (after 100-continue or a proxy CONNECT): forget the previous one.
                    status.set(Some(code));
                    location.replace(None);
                    range_start.set(None);
                } else if let Some(value) = header_value(line, "location") {
                    location.replace(Some(value.to_string()));
                } else if let Some(value) = header_value(line, "content-range") {
                    range_start.set(parse_content_range_start(value));
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if control::should_stop(stop).is_some() {
                stopped = true;
                return Ok(0);
            }
            let code = status.get().unwrap_or(0);
            if !(200..300).contains(&code) {
                // Error and redirect bodies are discarded.
                return Ok(data.len());
            }
            if code == 206 && range_start.get() != Some(resume_from) {
                misplaced = true;
                return Ok(0);
            }
            if code == 200 && resume_from > 0 && !restarted {
                if let Err(e) = rewind(file) {
                    write_error = Some(e);
                    return Ok(0);
                }
                restarted = true;
            }
            match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    write_error = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_write_error() {
            if let Some(io_err) = write_error.take() {
                return Err(AttemptError::Io(io_err));
            }
            if stopped {
                return Err(AttemptError::Interrupted);
            }
            if misplaced {
                return Err(misplaced_range(resume_from, range_start.get()));
            }
        }
        // A reply without a status line.
        if e.is_unsupported_protocol()
            && e.extra_description().is_some_and(|d| d.contains("HTTP/0.9"))
        {
            return Err(AttemptError::Protocol(e.to_string()));
        }
        return Err(AttemptError::Curl(e));
    }

    let code = easy.response_code()?;
    check_status(code, location.borrow().as_deref())?;
    if code == 206 && range_start.get() != Some(resume_from) {
        return Err(misplaced_range(resume_from, range_start.get()));
    }

    if code == 200 && resume_from > 0 && !restarted {
        // Empty 200 body on a resume: the remote resource is now empty.
        rewind(file)?;
        restarted = true;
    }
    file.flush()?;

    tracing::debug!(status = code, written, restarted, "attempt finished");
    Ok(FetchReport {
        status: code,
        bytes_written: written,
        restarted,
    })
}

fn rewind(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn misplaced_range(expected: u64, got: Option<u64>) -> AttemptError {
    match got {
        Some(start) => AttemptError::Protocol(format!(
            "partial content starts at byte {}, expected {}",
            start, expected
        )),
        None => AttemptError::Protocol("partial content without Content-Range".to_string()),
    }
}

/// First byte of a `bytes START-END/TOTAL` range.
fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

/// Status code from an `HTTP/x.y NNN reason` line.
fn parse_status_line(line: &str) -> Option<u32> {
    let line = line.trim();
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Value of header `name` if `line` is that header.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (n, v) = line.split_once(':')?;
    if n.trim().eq_ignore_ascii_case(name) {
        Some(v.trim())
    } else {
        None
    }
}
