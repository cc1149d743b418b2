//! Everything one supervisor run owns and must release
//!
//! Each process the supervisor spawns is adopted here together with the
//! pid file and the temp config. [`ProcessTree::shutdown`] tears all of it
//! down exactly once; later calls return immediately.

use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, warn};

use crate::hub_config::MaterializedConfig;

/// Grace period between asking a process to stop and killing it
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(300);

/// Handle to a process adopted by a [`ProcessTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle(usize);

#[derive(Debug)]
struct OwnedProcess {
    name: &'static str,
    pid: Option<u32>,
    /// Spawned as the leader of its own process group, so its descendants
    /// can be signalled through the group
    group_leader: bool,
    child: Child,
}

#[derive(Debug)]
pub struct ProcessTree {
    processes: Vec<OwnedProcess>,
    pid_file: Option<PathBuf>,
    config: Option<MaterializedConfig>,
    grace: Duration,
    shut_down: bool,
}

impl ProcessTree {
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            processes: Vec::new(),
            pid_file: None,
            config: None,
            grace,
            shut_down: false,
        }
    }

    /// Take ownership of a spawned child
    pub fn adopt(&mut self, name: &'static str, child: Child, group_leader: bool) -> ProcessHandle {
        let pid = child.id();
        debug!(name, pid = ?pid, group_leader, "Adopted process");
        self.processes.push(OwnedProcess {
            name,
            pid,
            group_leader,
            child,
        });
        ProcessHandle(self.processes.len() - 1)
    }

    pub fn child_mut(&mut self, handle: ProcessHandle) -> &mut Child {
        &mut self.processes[handle.0].child
    }

    pub fn pid(&self, handle: ProcessHandle) -> Option<u32> {
        self.processes[handle.0].pid
    }

    /// Own the pid file; it is deleted during shutdown
    pub fn track_pid_file(&mut self, path: PathBuf) {
        self.pid_file = Some(path);
    }

    /// Own the temp config; it is deleted during shutdown
    pub fn track_config(&mut self, config: MaterializedConfig) {
        self.config = Some(config);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Stop every owned process, newest first, then delete the pid file and
    /// the temp config. Only the first call does anything.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let grace = self.grace;
        for process in self.processes.iter_mut().rev() {
            process.terminate(grace).await;
        }

        if let Some(pid_file) = self.pid_file.take() {
            match std::fs::remove_file(&pid_file) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %pid_file.display(), error = %err, "Could not remove pid file")
                }
            }
        }

        if let Some(mut config) = self.config.take()
            && let Err(err) = config.remove()
        {
            warn!(path = %config.path().display(), error = %err, "Could not remove temp config");
        }

        debug!("Process tree released");
    }
}

impl OwnedProcess {
    /// SIGTERM, wait out the grace period, then SIGKILL and reap.
    ///
    /// Group leaders are signalled through their process group so plugin
    /// processes they started go down with them, even when the leader has
    /// already exited.
    async fn terminate(&mut self, grace: Duration) {
        let exited = matches!(self.child.try_wait(), Ok(Some(_)));
        if exited && !self.group_leader {
            debug!(name = self.name, "Process already exited");
            return;
        }

        let Some(pid) = self.pid else {
            let _ = self.child.wait().await;
            return;
        };

        debug!(name = self.name, pid, "Stopping process");
        if self.signal(pid, Signal::Terminate) {
            tokio::time::sleep(grace).await;
        }
        self.signal(pid, Signal::Kill);

        if let Err(err) = self.child.start_kill()
            && err.kind() != std::io::ErrorKind::InvalidInput
        {
            debug!(name = self.name, pid, error = %err, "Kill after group signal");
        }
        if let Err(err) = self.child.wait().await {
            warn!(name = self.name, pid, error = %err, "Could not reap process");
        }
    }

    /// Deliver `signal`; true when at least one process received it
    #[cfg(unix)]
    fn signal(&self, pid: u32, which: Signal) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::{self, killpg};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        let target = Pid::from_raw(raw);
        let sig = match which {
            Signal::Terminate => signal::Signal::SIGTERM,
            Signal::Kill => signal::Signal::SIGKILL,
        };

        let result = if self.group_leader {
            killpg(target, sig)
        } else {
            signal::kill(target, sig)
        };
        match result {
            Ok(()) => true,
            Err(Errno::ESRCH) => false,
            Err(err) => {
                warn!(name = self.name, pid, signal = %sig, error = %err, "Could not signal process");
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self, _pid: u32, which: Signal) -> bool {
        match which {
            Signal::Terminate => false,
            Signal::Kill => self.child.start_kill().is_ok(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}
