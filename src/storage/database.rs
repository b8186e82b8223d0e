//! SQLite database management with migrations
//!
//! Provides structured storage for pages, their metric history and decay state

use crate::error::{DecayError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) a database file
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DecayError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        {
            let conn = pool.get()?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let page_count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;

        let snapshot_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;

        let decaying_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE is_decaying = 1",
            [],
            |row| row.get(0),
        )?;

        let run_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM decay_runs", [], |row| row.get(0))?;

        Ok(DbStats {
            page_count: page_count as usize,
            snapshot_count: snapshot_count as usize,
            decaying_count: decaying_count as usize,
            run_count: run_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub page_count: usize,
    pub snapshot_count: usize,
    pub decaying_count: usize,
    pub run_count: usize,
}

/// Database migrations (each string is one migration)
pub(crate) const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE pages (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        title TEXT,
        page_type TEXT,
        is_decaying INTEGER NOT NULL DEFAULT 0,
        decay_severity TEXT,
        decay_factors TEXT,  -- JSON array
        decay_detected_at TEXT,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX idx_pages_decaying ON pages(is_decaying);

    CREATE TABLE snapshots (
        page_id TEXT NOT NULL,
        date TEXT NOT NULL,
        clicks INTEGER NOT NULL DEFAULT 0,
        impressions INTEGER NOT NULL DEFAULT 0,
        position REAL,
        PRIMARY KEY (page_id, date),
        FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_snapshots_date ON snapshots(date);

    CREATE TABLE decay_runs (
        id TEXT PRIMARY KEY,
        ran_at TEXT NOT NULL,
        pages_analyzed INTEGER NOT NULL,
        pages_decaying INTEGER NOT NULL,
        pages_cleared INTEGER NOT NULL
    );

    CREATE INDEX idx_decay_runs_ran_at ON decay_runs(ran_at);
    "#,
];
