//! Interactive download job: terminal prompts for redirects and proxy credentials.

use anyhow::{bail, Result};
use dlretry_core::control::StopToken;
use dlretry_core::fetch::{fetch_to_file, FetchReport, FetchTarget, ProxySettings};
use dlretry_core::retry::{AttemptError, Job, MaxAttempts, RetryEvents, RetryPolicy};
use std::fs::File;
use std::io::{self, BufRead, Write};

pub struct CliJob {
    pub target: FetchTarget,
    file: File,
    stop: StopToken,
    policy: RetryPolicy,
    assume_yes: bool,
    proxy_credentials: Option<(String, String)>,
    failures: u32,
}

impl CliJob {
    pub fn new(
        target: FetchTarget,
        file: File,
        stop: StopToken,
        policy: RetryPolicy,
        assume_yes: bool,
        proxy_credentials: Option<(String, String)>,
    ) -> Self {
        Self {
            target,
            file,
            stop,
            policy,
            assume_yes,
            proxy_credentials,
            failures: 0,
        }
    }

    fn retry_label(&self) -> String {
        match self.policy.max_attempts {
            MaxAttempts::Limited(max) => format!("{}/{}", self.failures, max),
            MaxAttempts::Unbounded => format!("{}", self.failures),
        }
    }
}

impl RetryEvents for CliJob {
    fn on_proxy_needed(&mut self) {
        let Some(creds) = self.proxy_credentials.take().or_else(prompt_credentials) else {
            eprintln!("no proxy credentials given; retrying once without them");
            return;
        };
        match self.target.proxy.as_mut() {
            Some(proxy) => proxy.credentials = Some(creds),
            None => {
                tracing::debug!("proxy challenge without --proxy; using the environment proxy");
                self.target.proxy = Some(ProxySettings {
                    url: String::new(),
                    credentials: Some(creds),
                });
            }
        }
    }

    fn on_resume(&mut self) {
        let offset = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        if offset > 0 {
            eprintln!("resuming at {} bytes", offset);
        }
    }

    fn on_error(&mut self, cause: &AttemptError) {
        self.failures += 1;
        eprintln!("attempt failed: {}", cause);
    }

    fn on_retry(&mut self, remaining_secs: u32, _cause: &AttemptError) -> bool {
        if !self.policy.allows(self.failures) {
            eprintln!("giving up after {} failed attempts", self.failures);
            return false;
        }
        eprint!("\rretry {} in {}s ", self.retry_label(), remaining_secs);
        if remaining_secs == 0 {
            eprintln!();
        }
        true
    }

    fn on_moved(&mut self, location: &str) {
        let resolved = match resolve_location(&self.target.url, location) {
            Ok(u) => u,
            Err(e) => {
                eprintln!("cannot follow redirect: {:#}", e);
                self.stop.stop();
                return;
            }
        };
        let question = format!("server moved the file to {}; follow? [y/N] ", resolved);
        if self.assume_yes || prompt_yes_no(&question) {
            tracing::info!(from = %self.target.url, to = %resolved, "following redirect");
            self.target.url = resolved;
        } else {
            eprintln!("redirect declined");
            self.stop.stop();
        }
    }
}

impl Job for CliJob {
    type Output = FetchReport;

    fn attempt(&mut self) -> Result<FetchReport, AttemptError> {
        fetch_to_file(&self.target, &mut self.file, &self.stop)
    }
}

/// Absolute URL for a `Location` value, which may be relative to `base`.
pub fn resolve_location(base: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(base)?;
    let next = base.join(location)?;
    match next.scheme() {
        "http" | "https" => Ok(next.to_string()),
        other => bail!("unsupported redirect scheme {:?}", other),
    }
}

/// Split `USER:PASS`.
pub fn parse_credentials(s: &str) -> Result<(String, String)> {
    match s.split_once(':') {
        Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
        _ => bail!("proxy credentials must be USER:PASS"),
    }
}

/// File name for a URL: last non-empty path segment, or `download.bin`.
pub fn default_output_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    match path.split_once('/') {
        Some((_, p)) => p
            .rsplit('/')
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "download.bin".to_string()),
        None => "download.bin".to_string(),
    }
}

fn read_line(prompt: &str) -> Option<String> {
    eprint!("{}", prompt);
    let _ = io::stderr().flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn prompt_yes_no(question: &str) -> bool {
    matches!(read_line(question).as_deref(), Some("y") | Some("Y") | Some("yes"))
}

fn prompt_credentials() -> Option<(String, String)> {
    let user = read_line("proxy user: ").filter(|u| !u.is_empty())?;
    let pass = read_line("proxy password: ")?;
    Some((user, pass))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_absolute_and_relative_locations() {
        assert_eq!(
            resolve_location("http://a.example/dir/f.iso", "https://b.example/f.iso").unwrap(),
            "https://b.example/f.iso"
        );
        assert_eq!(
            resolve_location("http://a.example/dir/f.iso", "/mirror/f.iso").unwrap(),
            "http://a.example/mirror/f.iso"
        );
        assert_eq!(
            resolve_location("http://a.example/dir/f.iso", "g.iso").unwrap(),
            "http://a.example/dir/g.iso"
        );
    }

    #[test]
    fn resolve_rejects_non_http() {
        assert!(resolve_location("http://a.example/", "ftp://b.example/f").is_err());
        assert!(resolve_location("not a url", "/x").is_err());
    }

    #[test]
    fn credentials_parsing() {
        assert_eq!(
            parse_credentials("alice:s3:cret").unwrap(),
            ("alice".to_string(), "s3:cret".to_string())
        );
        assert!(parse_credentials("alice").is_err());
        assert!(parse_credentials(":pw").is_err());
    }

    #[test]
    fn output_name_from_url() {
        assert_eq!(default_output_name("https://a.example/pub/debian.iso"), "debian.iso");
        assert_eq!(default_output_name("https://a.example/pub/x.tar.gz?sig=1#f"), "x.tar.gz");
        assert_eq!(default_output_name("https://a.example/pub/"), "pub");
        assert_eq!(default_output_name("https://a.example"), "download.bin");
        assert_eq!(default_output_name("https://a.example/"), "download.bin");
    }

    fn make_job(policy: RetryPolicy, assume_yes: bool) -> (CliJob, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("out.bin")).unwrap();
        let job = CliJob::new(
            FetchTarget::new("http://a.example/dir/f.iso"),
            file,
            StopToken::new(),
            policy,
            assume_yes,
            None,
        );
        (job, dir)
    }

    #[test]
    fn retry_decision_follows_policy() {
        let (mut job, _dir) = make_job(RetryPolicy::new(MaxAttempts::Limited(1), 0), true);
        let cause = AttemptError::Protocol("x".into());
        job.on_error(&cause);
        assert!(job.on_retry(0, &cause));
        job.on_error(&cause);
        assert!(!job.on_retry(0, &cause));
    }

    #[test]
    fn confirmed_redirect_updates_target() {
        let (mut job, _dir) = make_job(RetryPolicy::default(), true);
        job.on_moved("/mirror/f.iso");
        assert_eq!(job.target.url, "http://a.example/mirror/f.iso");
        assert!(!job.stop.is_stopped());
    }

    #[test]
    fn unfollowable_redirect_raises_stop() {
        let (mut job, _dir) = make_job(RetryPolicy::default(), true);
        job.on_moved("ftp://b.example/f.iso");
        assert!(job.stop.is_stopped());
        assert_eq!(job.target.url, "http://a.example/dir/f.iso");
    }

    #[test]
    fn supplied_credentials_are_installed_on_proxy_challenge() {
        let (mut job, _dir) = make_job(RetryPolicy::default(), true);
        job.target.proxy = Some(ProxySettings {
            url: "http://proxy.local:3128".into(),
            credentials: None,
        });
        job.proxy_credentials = Some(("u".into(), "p".into()));
        job.on_proxy_needed();
        let proxy = job.target.proxy.as_ref().unwrap();
        assert_eq!(proxy.credentials, Some(("u".to_string(), "p".to_string())));
    }
}
