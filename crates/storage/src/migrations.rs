// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inline schema migrations, applied in order and tracked in `_migrations`

pub const MIGRATIONS: &[&str] = &[
    // 1: run records
    r#"
CREATE TABLE IF NOT EXISTS runs (
    run_id TEXT PRIMARY KEY,
    start_time TEXT NOT NULL,
    end_time TEXT,
    run_status TEXT NOT NULL
);
"#,
    // 2: run configurations (single runs and schedule templates)
    r#"
CREATE TABLE IF NOT EXISTS run_configuration (
    run_id TEXT PRIMARY KEY,
    project TEXT NOT NULL,
    server_url TEXT NOT NULL DEFAULT '',
    cloud_provider TEXT NOT NULL,
    provider_config TEXT NOT NULL DEFAULT '{}',
    requester TEXT NOT NULL,
    invocation TEXT NOT NULL,
    cron_schedule TEXT,
    schedule_name TEXT,
    schedule_description TEXT,
    created_at TEXT NOT NULL
);
"#,
    // 3: the lock; the CHECK keeps it to a single row
    r#"
CREATE TABLE IF NOT EXISTS lock (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    holder TEXT NOT NULL,
    run_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_run_configuration_project ON run_configuration(project);
"#,
];
