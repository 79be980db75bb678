// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run registry backed by SQLite
//!
//! Three tables: `runs` (run records), `run_configuration`, and `lock`
//! (at most one row). Every write touches a single row.

use crate::migrations;
use chrono::{DateTime, Utc};
use rj_core::{LockRecord, RunConfiguration, RunId, RunRecord, RunStatus, TransitionError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Attempts before giving up on a lock row that keeps vanishing between
/// the insert and the read-back
const LOCK_INSERT_ATTEMPTS: usize = 8;

/// Errors that can occur in registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("failed to create registry directory: {0}")]
    CreateDir(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run not found: {0}")]
    RunNotFound(RunId),
    #[error("run configuration not found: {0}")]
    ConfigurationNotFound(RunId),
    #[error("run already exists: {0}")]
    DuplicateRun(RunId),
    #[error("not a schedule: {0}")]
    NotASchedule(RunId),
    #[error("run {run_id}: {source}")]
    Transition {
        run_id: RunId,
        #[source]
        source: TransitionError,
    },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("lock row contention did not settle")]
    LockContention,
}

/// Outcome of an atomic lock insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockInsert {
    Inserted,
    /// Another record already held the lock; returned unchanged
    Held(LockRecord),
}

/// Registry handle wrapping a SQLite connection pool
#[derive(Debug, Clone)]
pub struct Registry {
    pool: SqlitePool,
    path: PathBuf,
}

impl Registry {
    /// Open (or create) the registry at the given path and run migrations
    pub async fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let registry = Self {
            pool,
            path: path.to_owned(),
        };
        registry.run_migrations().await?;

        info!(path = %path.display(), "registry opened");
        Ok(registry)
    }

    /// Create an in-memory registry (for testing)
    ///
    /// A single connection that never expires, so the database lives as long
    /// as the pool and is private to this handle.
    pub async fn open_in_memory() -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let registry = Self {
            pool,
            path: PathBuf::new(),
        };
        registry.run_migrations().await?;
        Ok(registry)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_migrations(&self) -> Result<(), RegistryError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1;
            if version <= current {
                continue;
            }
            sqlx::query(migration).execute(&self.pool).await?;
            sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                .bind(version as i64)
                .execute(&self.pool)
                .await?;
            debug!(version, "applied migration");
        }
        Ok(())
    }

    // === Runs ===

    /// Insert a run record. A run id is recorded at most once.
    pub async fn insert_run(
        &self,
        run_id: &RunId,
        start_time: DateTime<Utc>,
        status: RunStatus,
    ) -> Result<(), RegistryError> {
        let result = sqlx::query(
            "INSERT INTO runs (run_id, start_time, end_time, run_status) VALUES (?, ?, NULL, ?)
             ON CONFLICT(run_id) DO NOTHING",
        )
        .bind(run_id.as_str())
        .bind(start_time)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::DuplicateRun(run_id.clone()));
        }
        Ok(())
    }

    /// Move a run to `status`
    ///
    /// The predecessor check is part of the UPDATE so concurrent writers
    /// cannot move a run backwards. `end_time` is only written when given.
    pub async fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<(), RegistryError> {
        let predecessors = RunStatus::predecessors(status);
        if !predecessors.is_empty() {
            let placeholders = vec!["?"; predecessors.len()].join(", ");
            let sql = format!(
                "UPDATE runs SET run_status = ?, end_time = COALESCE(?, end_time)
                 WHERE run_id = ? AND run_status IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql)
                .bind(status.as_str())
                .bind(end_time)
                .bind(run_id.as_str());
            for predecessor in &predecessors {
                query = query.bind(predecessor.as_str());
            }
            if query.execute(&self.pool).await?.rows_affected() == 1 {
                return Ok(());
            }
        }

        // Nothing updated: report why
        let current = self
            .get_run(run_id)
            .await?
            .ok_or_else(|| RegistryError::RunNotFound(run_id.clone()))?;
        Err(RegistryError::Transition {
            run_id: run_id.clone(),
            source: TransitionError {
                from: current.run_status,
                to: status,
            },
        })
    }

    pub async fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, RegistryError> {
        let row = sqlx::query(
            "SELECT run_id, start_time, end_time, run_status FROM runs WHERE run_id = ?",
        )
        .bind(run_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(run_from_row).transpose()
    }

    /// Most recent runs first, optionally restricted to one project
    pub async fn list_runs(
        &self,
        skip: u32,
        limit: u32,
        project: Option<&str>,
    ) -> Result<Vec<RunRecord>, RegistryError> {
        let rows = match project {
            Some(project) => {
                sqlx::query(
                    "SELECT r.run_id, r.start_time, r.end_time, r.run_status
                     FROM runs r JOIN run_configuration c ON c.run_id = r.run_id
                     WHERE c.project = ?
                     ORDER BY julianday(r.start_time) DESC, r.run_id DESC
                     LIMIT ? OFFSET ?",
                )
                .bind(project)
                .bind(i64::from(limit))
                .bind(i64::from(skip))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT run_id, start_time, end_time, run_status FROM runs
                     ORDER BY julianday(start_time) DESC, run_id DESC
                     LIMIT ? OFFSET ?",
                )
                .bind(i64::from(limit))
                .bind(i64::from(skip))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(run_from_row).collect()
    }

    /// Runs that have not reached a terminal status, oldest first
    pub async fn list_unfinished(&self) -> Result<Vec<RunRecord>, RegistryError> {
        let rows = sqlx::query(
            "SELECT run_id, start_time, end_time, run_status FROM runs
             WHERE run_status IN ('INITIALIZING', 'RUNNING')
             ORDER BY julianday(start_time), run_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(run_from_row).collect()
    }

    // === Run configurations ===

    /// Upsert a run configuration
    pub async fn insert_run_configuration(
        &self,
        config: &RunConfiguration,
    ) -> Result<(), RegistryError> {
        sqlx::query(
            "INSERT INTO run_configuration (
                run_id, project, server_url, cloud_provider, provider_config, requester,
                invocation, cron_schedule, schedule_name, schedule_description, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(run_id) DO UPDATE SET
                project = excluded.project,
                server_url = excluded.server_url,
                cloud_provider = excluded.cloud_provider,
                provider_config = excluded.provider_config,
                requester = excluded.requester,
                invocation = excluded.invocation,
                cron_schedule = excluded.cron_schedule,
                schedule_name = excluded.schedule_name,
                schedule_description = excluded.schedule_description",
        )
        .bind(config.run_id.as_str())
        .bind(&config.project)
        .bind(&config.server_url)
        .bind(&config.cloud_provider)
        .bind(serde_json::to_string(&config.provider_config)?)
        .bind(&config.requester)
        .bind(serde_json::to_string(&config.invocation)?)
        .bind(&config.cron_schedule)
        .bind(&config.schedule_name)
        .bind(&config.schedule_description)
        .bind(config.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load a stored configuration exactly as persisted
    pub async fn load_run_configuration(
        &self,
        run_id: &RunId,
    ) -> Result<RunConfiguration, RegistryError> {
        let row = sqlx::query(
            "SELECT run_id, project, server_url, cloud_provider, provider_config, requester,
                    invocation, cron_schedule, schedule_name, schedule_description, created_at
             FROM run_configuration WHERE run_id = ?",
        )
        .bind(run_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => configuration_from_row(&row),
            None => Err(RegistryError::ConfigurationNotFound(run_id.clone())),
        }
    }

    /// Clone a schedule template into a fresh single-run configuration
    ///
    /// The new record is stored under `run_id` with schedule fields cleared.
    /// The template row is only read.
    pub async fn materialize_schedule(
        &self,
        schedule_id: &RunId,
        run_id: RunId,
        created_at: DateTime<Utc>,
    ) -> Result<RunConfiguration, RegistryError> {
        let template = self.load_run_configuration(schedule_id).await?;
        if !template.is_schedule() {
            return Err(RegistryError::NotASchedule(schedule_id.clone()));
        }
        let config = template.materialize(run_id, created_at);
        self.insert_run_configuration(&config).await?;
        Ok(config)
    }

    /// All stored schedule templates, newest first
    pub async fn list_schedule_configurations(
        &self,
    ) -> Result<Vec<RunConfiguration>, RegistryError> {
        let rows = sqlx::query(
            "SELECT run_id, project, server_url, cloud_provider, provider_config, requester,
                    invocation, cron_schedule, schedule_name, schedule_description, created_at
             FROM run_configuration WHERE cron_schedule IS NOT NULL
             ORDER BY julianday(created_at) DESC, run_id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(configuration_from_row).collect()
    }

    // === Lock row ===

    /// Insert the lock row unless one exists, in one statement
    ///
    /// On conflict the existing row is read back and returned. If it was
    /// released between the two statements the insert is retried.
    pub async fn insert_lock(&self, record: &LockRecord) -> Result<LockInsert, RegistryError> {
        for _ in 0..LOCK_INSERT_ATTEMPTS {
            let result = sqlx::query(
                "INSERT INTO lock (id, holder, run_id, created_at, updated_at)
                 VALUES (1, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(&record.holder)
            .bind(record.run_id.as_str())
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(LockInsert::Inserted);
            }
            if let Some(existing) = self.load_lock().await? {
                return Ok(LockInsert::Held(existing));
            }
            debug!("lock released during acquire, retrying");
        }
        Err(RegistryError::LockContention)
    }

    pub async fn load_lock(&self) -> Result<Option<LockRecord>, RegistryError> {
        let row =
            sqlx::query("SELECT holder, run_id, created_at, updated_at FROM lock WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        row.map(|row| -> Result<LockRecord, RegistryError> {
            Ok(LockRecord {
                holder: row.try_get("holder")?,
                run_id: RunId::new(row.try_get::<String, _>("run_id")?),
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    /// Set `updated_at` on the lock if it still protects `run_id`
    pub async fn touch_lock(
        &self,
        run_id: &RunId,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RegistryError> {
        let result = sqlx::query("UPDATE lock SET updated_at = ? WHERE id = 1 AND run_id = ?")
            .bind(updated_at)
            .bind(run_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the lock row. Returns whether one existed.
    pub async fn delete_lock(&self) -> Result<bool, RegistryError> {
        let result = sqlx::query("DELETE FROM lock WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete the lock row only if it protects `run_id`
    pub async fn delete_lock_for(&self, run_id: &RunId) -> Result<bool, RegistryError> {
        let result = sqlx::query("DELETE FROM lock WHERE id = 1 AND run_id = ?")
            .bind(run_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn run_from_row(row: &SqliteRow) -> Result<RunRecord, RegistryError> {
    let status: String = row.try_get("run_status")?;
    Ok(RunRecord {
        run_id: RunId::new(row.try_get::<String, _>("run_id")?),
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        run_status: status.parse().map_err(RegistryError::Corrupt)?,
    })
}

fn configuration_from_row(row: &SqliteRow) -> Result<RunConfiguration, RegistryError> {
    let provider_config: String = row.try_get("provider_config")?;
    let invocation: String = row.try_get("invocation")?;
    Ok(RunConfiguration {
        run_id: RunId::new(row.try_get::<String, _>("run_id")?),
        project: row.try_get("project")?,
        server_url: row.try_get("server_url")?,
        cloud_provider: row.try_get("cloud_provider")?,
        provider_config: serde_json::from_str(&provider_config)?,
        requester: row.try_get("requester")?,
        invocation: serde_json::from_str(&invocation)?,
        cron_schedule: row.try_get("cron_schedule")?,
        schedule_name: row.try_get("schedule_name")?,
        schedule_description: row.try_get("schedule_description")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
