//! Environment-derived inputs captured once per invocation
//!
//! Nothing below `main` reads `HOME`, `ORCHESTRA_HOME` or the current
//! executable path directly; they are resolved here and passed down.

use std::path::{Path, PathBuf};

use crate::error::{Result, SupervisorError};

/// Environment variable that relocates `~/.orchestra`
pub const ORCHESTRA_HOME_ENV: &str = "ORCHESTRA_HOME";

/// Immutable run context shared by every command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// The user's home directory
    pub home_dir: PathBuf,
    /// Root of per-user orchestra state (`~/.orchestra` by default)
    pub orchestra_home: PathBuf,
    /// Directory holding the bundled sibling binaries
    pub bin_dir: PathBuf,
}

impl RunContext {
    /// Capture the context from the process environment.
    ///
    /// `bin_dir` overrides the sibling binary directory; otherwise it is the
    /// directory of the running executable with symlinks resolved.
    pub fn capture(bin_dir: Option<PathBuf>) -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or(SupervisorError::HomeDirUnavailable)?;

        let orchestra_home = match std::env::var_os(ORCHESTRA_HOME_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => home_dir.join(".orchestra"),
        };

        let bin_dir = match bin_dir {
            Some(dir) => absolutize(&dir).map_err(|source| SupervisorError::PathResolution {
                what: "binary directory",
                source,
            })?,
            None => executable_dir()?,
        };

        Ok(Self {
            home_dir,
            orchestra_home,
            bin_dir,
        })
    }

    /// Build a context from explicit parts
    pub fn new(home_dir: PathBuf, orchestra_home: PathBuf, bin_dir: PathBuf) -> Self {
        Self {
            home_dir,
            orchestra_home,
            bin_dir,
        }
    }

    /// `<orchestra home>/plugins`
    pub fn plugins_dir(&self) -> PathBuf {
        self.orchestra_home.join("plugins")
    }

    /// `<orchestra home>/plugins/registry.json`
    pub fn registry_path(&self) -> PathBuf {
        self.plugins_dir().join("registry.json")
    }

    /// `<orchestra home>/certs`
    pub fn default_certs_dir(&self) -> PathBuf {
        self.orchestra_home.join("certs")
    }

    /// Expand a leading `~` to the captured home directory
    pub fn expand_home(&self, path: &str) -> PathBuf {
        match path.strip_prefix('~') {
            Some(rest) => self.home_dir.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .and_then(|path| path.canonicalize())
        .map_err(|source| SupervisorError::PathResolution {
            what: "self path",
            source,
        })?;

    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| SupervisorError::PathResolution {
            what: "self path",
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "executable has no parent directory",
            ),
        })
}

/// Make `path` absolute against the current directory, resolving symlinks
/// when the path exists.
pub fn absolutize(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    match absolute.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(absolute),
        Err(err) => Err(err),
    }
}
