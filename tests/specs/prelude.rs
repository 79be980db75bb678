// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for CLI specs

use assert_cmd::Command;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

/// How long a spawned daemon gets to print READY
const READY_TIMEOUT: Duration = Duration::from_secs(20);

/// A scratch project directory with its own rjd state directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("project")).unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        Self { dir }
    }

    /// A minimal dbt-like project
    pub fn with_models() -> Self {
        let project = Self::empty();
        project.file("dbt_project.yml", "name: analytics\n");
        project.file("models/orders.sql", "select 1\n");
        project.file("target/manifest.json", "{}\n");
        project
    }

    pub fn project_dir(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn file(&self, relative: &str, content: &str) {
        let path = self.project_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// `rj` with a clean environment, run from the project directory
    pub fn rj(&self) -> CliRun {
        let mut cmd = Command::cargo_bin("rj").unwrap();
        cmd.current_dir(self.project_dir())
            .env_remove("RJ_SERVER_URL")
            .env("RJ_USER", "spec-user")
            .env("RUST_LOG", "warn");
        CliRun { cmd }
    }

    /// Start `rjd` on a free port with the given extra config
    pub fn daemon(&self, extra_config: &str) -> Daemon {
        let port = free_port();
        let config = format!("listen = \"127.0.0.1:{}\"\n{}", port, extra_config);
        std::fs::write(self.state_dir().join("rjd.toml"), config).unwrap();
        Daemon::spawn(&self.state_dir(), port)
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A running `rjd`, killed on drop
pub struct Daemon {
    child: Child,
    pub url: String,
}

impl Daemon {
    fn spawn(state_dir: &Path, port: u16) -> Self {
        let program = assert_cmd::cargo::cargo_bin("rjd");
        let mut child = std::process::Command::new(program)
            .arg("--state-dir")
            .arg(state_dir)
            .env_remove("RJ_LISTEN")
            .env_remove("RJ_SERVER_URL")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if line == "READY" {
                    let _ = tx.send(());
                }
            }
        });
        if rx.recv_timeout(READY_TIMEOUT).is_err() {
            let _ = child.kill();
            panic!("rjd did not become ready");
        }

        Self {
            child,
            url: format!("http://127.0.0.1:{}", port),
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A CLI invocation under construction
pub struct CliRun {
    cmd: Command,
}

impl CliRun {
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.cmd.args(args);
        self
    }

    /// Point at a running daemon
    pub fn server(mut self, daemon: &Daemon) -> Self {
        self.cmd.env("RJ_SERVER_URL", &daemon.url);
        self
    }

    pub fn passes(mut self) -> Outcome {
        let output = self.cmd.output().unwrap();
        let outcome = Outcome::from(output);
        assert!(outcome.success, "expected success\n{}", outcome);
        outcome
    }

    pub fn fails(mut self) -> Outcome {
        let output = self.cmd.output().unwrap();
        let outcome = Outcome::from(output);
        assert!(!outcome.success, "expected failure\n{}", outcome);
        outcome
    }
}

/// Captured result of a CLI invocation
pub struct Outcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for Outcome {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--- stdout ---\n{}\n--- stderr ---\n{}", self.stdout, self.stderr)
    }
}

impl Outcome {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout lacks {:?}\n{}", needle, self);
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(!self.stdout.contains(needle), "stdout has {:?}\n{}", needle, self);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr lacks {:?}\n{}", needle, self);
        self
    }
}
