//! Readiness detection over the shared log
//!
//! The hub prints one `registered and booted` line per component that came
//! up and one `listening on <addr>` line once its endpoint is bound. The
//! supervisor only ever reads the whole log and searches it, so interleaved
//! writes from plugins are harmless.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, trace};

use crate::error::{Result, SupervisorError};

pub const READY_MARKER: &str = "registered and booted";

static LISTEN_ADDR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"listening on (\S+)").expect("address pattern is valid"));

/// How long and how often to poll, and how many markers make the hub ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub attempts: u32,
    /// Markers required; the two built-ins are the mandatory components
    pub threshold: usize,
}

impl ReadinessPolicy {
    /// Total time the poll may take
    pub fn ceiling(&self) -> Duration {
        self.interval * self.attempts
    }
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            attempts: 30,
            threshold: 2,
        }
    }
}

pub fn count_markers(log: &str) -> usize {
    log.matches(READY_MARKER).count()
}

/// First address announced in `log`
pub fn extract_address(log: &str) -> Option<&str> {
    LISTEN_ADDR
        .captures(log)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whole log contents; unreadable logs read as empty
pub async fn read_log(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Log not readable yet");
            String::new()
        }
    }
}

/// Poll `log_path` until the hub reports enough booted components.
///
/// Fails as soon as the hub has exited, and after `policy.attempts` polls
/// otherwise. Returns the number of markers seen.
pub async fn await_ready(
    hub: &mut Child,
    log_path: &Path,
    policy: &ReadinessPolicy,
) -> Result<usize> {
    for attempt in 1..=policy.attempts {
        tokio::time::sleep(policy.interval).await;

        let log = read_log(log_path).await;
        let booted = count_markers(&log);
        trace!(attempt, booted, "Readiness poll");
        if booted >= policy.threshold {
            debug!(attempt, booted, "Hub ready");
            return Ok(booted);
        }

        match hub.try_wait() {
            Ok(Some(status)) => {
                return Err(SupervisorError::HubExited {
                    status: status.to_string(),
                    log: log_path.to_path_buf(),
                });
            }
            Ok(None) => {}
            Err(err) => {
                return Err(SupervisorError::Wait {
                    name: "orchestrator",
                    source: err,
                });
            }
        }
    }

    Err(SupervisorError::ReadyTimeout {
        seconds: policy.ceiling().as_secs(),
        log: log_path.to_path_buf(),
    })
}

/// Pull the hub's address out of the log once it is ready
pub fn resolve_address(log: &str, log_path: &Path) -> Result<String> {
    extract_address(log)
        .map(str::to_string)
        .ok_or_else(|| SupervisorError::AddressNotFound {
            log: log_path.to_path_buf(),
        })
}
