//! Fake install layout shared by the integration tests
//!
//! Every test gets its own temp root holding a bin dir of shell-script
//! stand-ins for the bundled binaries, an orchestra home, a workspace and a
//! state dir the fakes write their observations to.
#![allow(dead_code)]

use assert_cmd::prelude::*;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

pub const HUB_ADDR: &str = "127.0.0.1:54321";

/// Announces the address and two booted components, then idles
pub const HUB_READY: &str = r#"#!/bin/sh
echo $$ > "$FAKE_STATE/hub_pid"
echo "$2" > "$FAKE_STATE/config_path"
cp "$2" "$FAKE_STATE/config.yaml"
echo "orchestrator listening on 127.0.0.1:54321"
echo "storage.markdown registered and booted"
echo "tools.features registered and booted"
exec sleep 30
"#;

/// Never reports a booted component
pub const HUB_SILENT: &str = r#"#!/bin/sh
echo $$ > "$FAKE_STATE/hub_pid"
echo "$2" > "$FAKE_STATE/config_path"
echo "orchestrator starting"
exec sleep 30
"#;

/// Dies during boot
pub const HUB_CRASHING: &str = r#"#!/bin/sh
echo "orchestrator: bind failed" >&2
exit 3
"#;

/// Boots but never says where it listens
pub const HUB_NO_ADDRESS: &str = r#"#!/bin/sh
echo $$ > "$FAKE_STATE/hub_pid"
echo "storage.markdown registered and booted"
echo "tools.features registered and booted"
exec sleep 30
"#;

/// Echoes stdin back to stdout until EOF
pub const TRANSPORT_ECHO: &str = r#"#!/bin/sh
echo $$ > "$FAKE_STATE/transport_pid"
printf '%s\n' "$@" > "$FAKE_STATE/transport_args"
exec cat
"#;

pub const TRANSPORT_EXIT_7: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$FAKE_STATE/transport_args"
exit 7
"#;

const IDLE: &str = "#!/bin/sh\nexec sleep 30\n";

pub struct Fixture {
    _root: TempDir,
    pub bin_dir: PathBuf,
    pub home: PathBuf,
    pub orchestra_home: PathBuf,
    pub workspace: PathBuf,
    pub state: PathBuf,
}

impl Fixture {
    /// Layout with a ready hub and an echoing transport
    pub fn new() -> Self {
        Self::with_fakes(HUB_READY, TRANSPORT_ECHO)
    }

    pub fn with_fakes(hub: &str, transport: &str) -> Self {
        let root = tempdir().unwrap();
        let root_path = root.path().canonicalize().unwrap();

        let fixture = Self {
            bin_dir: root_path.join("bin"),
            home: root_path.join("home"),
            orchestra_home: root_path.join("orchestra"),
            workspace: root_path.join("project"),
            state: root_path.join("state"),
            _root: root,
        };
        for dir in [
            &fixture.bin_dir,
            &fixture.home,
            &fixture.orchestra_home,
            &fixture.workspace,
            &fixture.state,
        ] {
            fs::create_dir_all(dir).unwrap();
        }

        fixture.install("orchestrator", hub);
        fixture.install("storage-markdown", IDLE);
        fixture.install("tools-features", IDLE);
        fixture.install("transport-stdio", transport);
        fixture
    }

    /// Write an executable script into the bin dir
    pub fn install(&self, name: &str, script: &str) -> PathBuf {
        write_script(&self.bin_dir.join(name), script)
    }

    /// `orchestra` with the environment pointed at this fixture
    pub fn command(&self) -> assert_cmd::Command {
        assert_cmd::Command::from_std(self.std_command())
    }

    pub fn std_command(&self) -> Command {
        let mut cmd = Command::cargo_bin("orchestra").unwrap();
        cmd.current_dir(&self.workspace)
            .env("HOME", &self.home)
            .env("ORCHESTRA_HOME", &self.orchestra_home)
            .env("ORCHESTRA_BIN_DIR", &self.bin_dir)
            .env("FAKE_STATE", &self.state)
            .env("NO_COLOR", "1")
            .env_remove("ORCHESTRA_WORKSPACE")
            .env_remove("ORCHESTRA_CERTS_DIR")
            .env_remove("ORCHESTRA_LOG")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn registry_path(&self) -> PathBuf {
        self.orchestra_home.join("plugins/registry.json")
    }

    /// Write a registry holding `plugins`, keyed by their repo
    pub fn write_registry(&self, plugins: &[Value]) {
        let mut map = Map::new();
        for plugin in plugins {
            let repo = plugin["repo"].as_str().unwrap().to_string();
            map.insert(repo, plugin.clone());
        }
        let registry = json!({ "plugins": map });
        self.write_registry_raw(&serde_json::to_string_pretty(&registry).unwrap());
    }

    pub fn write_registry_raw(&self, contents: &str) {
        let path = self.registry_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn read_registry(&self) -> Value {
        let data = fs::read(self.registry_path()).unwrap();
        serde_json::from_slice(&data).unwrap()
    }

    /// Something a fake wrote into the state dir
    pub fn observed(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.state.join(name)).ok()
    }

    pub fn hub_pid(&self) -> Option<i32> {
        self.observed("hub_pid")?.trim().parse().ok()
    }

    pub fn transport_pid(&self) -> Option<i32> {
        self.observed("transport_pid")?.trim().parse().ok()
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        let path = self.observed("config_path")?;
        Some(PathBuf::from(path.trim()))
    }

    pub fn pid_file(&self) -> PathBuf {
        self.workspace.join(".orchestra-mcp.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.workspace.join(".orchestra-mcp.log")
    }
}

pub fn write_script(path: &Path, script: &str) -> PathBuf {
    fs::write(path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    path.to_path_buf()
}

/// Registry entry in the on-disk layout
pub fn plugin(id: &str, repo: &str, binary: &Path, tools: usize, storage: usize) -> Value {
    let tools: Vec<String> = (0..tools).map(|i| format!("tool_{i}")).collect();
    let storage: Vec<String> = (0..storage).map(|i| format!("store_{i}")).collect();
    json!({
        "id": id,
        "version": "v1.2.0",
        "binary": binary,
        "repo": repo,
        "installed_at": "2026-01-05T10:00:00Z",
        "provides_tools": tools,
        "provides_storage": storage,
        "needs_storage": [],
    })
}
