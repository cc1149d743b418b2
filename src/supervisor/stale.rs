//! Sweep for processes left over from an earlier run
//!
//! A previous supervisor that died without cleaning up can leave a hub or
//! plugin bound to the same binaries. Those are found by executable path
//! since no trustworthy pid file exists at this point.

use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::System;
use tracing::info;

use crate::error::{Result, SupervisorError};

/// Pause after the sweep so killed processes release their ports
pub const STALE_GRACE: Duration = Duration::from_millis(500);

/// Kill every process whose executable is one of `binaries`, except this
/// one. Returns how many were killed.
pub fn terminate_stale(binaries: &[PathBuf]) -> Result<usize> {
    let own_pid = std::process::id();

    let mut system = System::new();
    system.refresh_processes();

    let mut killed = 0;
    let mut failed = Vec::new();
    for (pid, process) in system.processes() {
        if pid.as_u32() == own_pid {
            continue;
        }
        let Some(exe) = process.exe() else {
            continue;
        };
        if !matches_any(exe, binaries) {
            continue;
        }

        if process.kill() {
            info!(pid = pid.as_u32(), exe = %exe.display(), "Killed stale process");
            killed += 1;
        } else {
            failed.push(pid.as_u32());
        }
    }

    if failed.is_empty() {
        Ok(killed)
    } else {
        Err(SupervisorError::StaleProcesses { pids: failed })
    }
}

fn matches_any(exe: &Path, binaries: &[PathBuf]) -> bool {
    binaries.iter().any(|binary| binary.as_path() == exe)
}
