//! Test helpers for black-box daemon/CLI specs.
//!
//! Spawns a real `substratd` against an isolated `SUBSTRAT_STATE_DIR` and
//! drives it through the `substrat` binary, asserting on stdout/exit code.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL_MS: u64 = 20;
const STARTUP_TIMEOUT_MS: u64 = 3000;

pub fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn fake_agent_cmd() -> String {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let script = manifest_dir.join("tests/fixtures/fake_agent.py");
    format!("python3 {}", script.display())
}

pub fn wait_for<F: FnMut() -> bool>(timeout_ms: u64, mut condition: F) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
    false
}

/// A running daemon under an isolated state directory, started and torn
/// down around one test.
pub struct Daemon {
    state_dir: tempfile::TempDir,
    child: Child,
}

impl Daemon {
    pub fn start() -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let child = Command::new(binary_path("substratd"))
            .env("SUBSTRAT_STATE_DIR", state_dir.path())
            .env("SUBSTRAT_AGENT_CMD", fake_agent_cmd())
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("substratd should spawn");

        let socket_path = state_dir.path().join("daemon.sock");
        let started = wait_for(STARTUP_TIMEOUT_MS, || socket_path.exists());
        assert!(started, "substratd did not create its socket in time");

        Self { state_dir, child }
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Build a `substrat` command wired to this daemon's state directory.
    pub fn cli(&self) -> CliBuilder {
        CliBuilder::new(self.state_dir.path().to_path_buf())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub struct CliBuilder {
    state_dir: PathBuf,
    args: Vec<String>,
}

impl CliBuilder {
    fn new(state_dir: PathBuf) -> Self {
        Self { state_dir, args: Vec::new() }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(binary_path("substrat"));
        cmd.args(&self.args).env("SUBSTRAT_STATE_DIR", &self.state_dir);
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let output = self.command().output().expect("substrat should run");
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let output = self.command().output().expect("substrat should run");
        assert!(
            !output.status.success(),
            "expected failure, but it passed\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{}'\nstdout: {}", expected, stdout);
        self
    }

    pub fn stdout_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).expect("stdout should be JSON")
    }
}
