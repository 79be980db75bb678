// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: state-directory paths and the optional TOML file

use rj_core::LockConfig;
use rj_engine::{ExecutorConfig, RuntimeConfig, DEFAULT_POLL_INTERVAL};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file looked up in the state directory when `--config` is absent
pub const CONFIG_FILE: &str = "rjd.toml";

const DEFAULT_LISTEN: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine state directory (set RJ_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid {name}={value:?}: {reason}")]
    Env {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{section}.{field} is required for the {backend} backend")]
    Missing {
        section: &'static str,
        field: &'static str,
        backend: &'static str,
    },
}

/// Files the daemon keeps under its state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub state_dir: PathBuf,
    /// TOML config; optional on disk
    pub config_path: PathBuf,
    /// Lock/PID file held for the daemon's lifetime
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    /// SQLite run registry
    pub registry_path: PathBuf,
    /// Root of the `runs/` and `schedules/` namespaces
    pub artifacts_root: PathBuf,
}

impl Paths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            config_path: state_dir.join(CONFIG_FILE),
            pid_path: state_dir.join("rjd.pid"),
            log_path: state_dir.join("rjd.log"),
            registry_path: state_dir.join("registry.db"),
            artifacts_root: state_dir.clone(),
            state_dir,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.config_path = path;
        }
        self
    }

    /// Pick the state directory from the flag, `RJ_STATE_DIR`, or the XDG default
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::resolve_with(explicit, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        explicit: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = explicit {
            return Ok(Self::new(dir));
        }
        if let Some(dir) = env("RJ_STATE_DIR").filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        if let Some(xdg) = env("XDG_STATE_HOME").filter(|d| !d.is_empty()) {
            return Ok(Self::new(PathBuf::from(xdg).join("rj")));
        }
        let home = env("HOME").ok_or(ConfigError::NoStateDir)?;
        Ok(Self::new(PathBuf::from(home).join(".local/state/rj")))
    }
}

/// Top-level `rjd.toml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP listen address
    pub listen: SocketAddr,
    /// Public URL schedule triggers call back into
    pub server_url: Option<String>,
    pub lock: LockConfig,
    pub logs: LogsConfig,
    pub workload: WorkloadConfig,
    pub dispatch: DispatchConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(DEFAULT_LISTEN),
            server_url: None,
            lock: LockConfig::default(),
            logs: LogsConfig::default(),
            workload: WorkloadConfig::default(),
            dispatch: DispatchConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    /// Sleep between polls of a log with nothing new
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadConfig {
    pub program: String,
    pub output_subdir: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        let executor = ExecutorConfig::default();
        Self {
            program: executor.program,
            output_subdir: executor.output_subdir,
            env: BTreeMap::new(),
        }
    }
}

/// Where runs execute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchBackend {
    #[default]
    InProcess,
    LocalProcess,
    ServerlessJob,
    ContainerInstance,
}

impl DispatchBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchBackend::InProcess => "in_process",
            DispatchBackend::LocalProcess => "local_process",
            DispatchBackend::ServerlessJob => "serverless_job",
            DispatchBackend::ContainerInstance => "container_instance",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub backend: DispatchBackend,
    pub api_url: Option<String>,
    /// Container image holding `rjd` and the workload
    pub image: Option<String>,
    /// Name of the environment variable holding the API token
    pub token_env: Option<String>,
    pub region: Option<String>,
}

/// Where cron triggers are registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerBackend {
    /// Triggers are only logged
    #[default]
    #[serde(rename = "none")]
    Disabled,
    Cloud,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub backend: SchedulerBackend,
    pub api_url: Option<String>,
    pub token_env: Option<String>,
    pub time_zone: Option<String>,
}

impl Config {
    /// Read the config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `RJ_LISTEN` and `RJ_SERVER_URL`
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    pub fn apply_env_with(
        mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = env("RJ_LISTEN").filter(|v| !v.is_empty()) {
            self.listen = value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Env {
                name: "RJ_LISTEN",
                value: value.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(value) = env("RJ_SERVER_URL").filter(|v| !v.is_empty()) {
            self.server_url = Some(value);
        }
        Ok(self)
    }

    /// Check that each selected backend has what it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dispatch = &self.dispatch;
        if matches!(
            dispatch.backend,
            DispatchBackend::ServerlessJob | DispatchBackend::ContainerInstance
        ) {
            let backend = dispatch.backend.as_str();
            if dispatch.api_url.is_none() {
                return Err(ConfigError::Missing {
                    section: "dispatch",
                    field: "api_url",
                    backend,
                });
            }
            if dispatch.image.is_none() {
                return Err(ConfigError::Missing {
                    section: "dispatch",
                    field: "image",
                    backend,
                });
            }
        }
        if self.scheduler.backend == SchedulerBackend::Cloud && self.scheduler.api_url.is_none() {
            return Err(ConfigError::Missing {
                section: "scheduler",
                field: "api_url",
                backend: "cloud",
            });
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            lock: self.lock.clone(),
            poll_interval: self.logs.poll_interval,
            executor: ExecutorConfig {
                program: self.workload.program.clone(),
                output_subdir: self.workload.output_subdir.clone(),
                env: self
                    .workload
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
            server_url: self.server_url.clone(),
        }
    }
}

/// Read a token from the variable a config section names
pub fn token_from_env(token_env: Option<&str>) -> Option<String> {
    token_env
        .and_then(|name| std::env::var(name).ok())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
