//! Storage layer for pagedecay
//!
//! Supplies page metric history to the analyzer and records its verdicts:
//! per-page decay flags, stale-flag clearing and a log of analysis runs.

pub mod database;

use crate::analyzer::{DecayFactor, DecayResult, MetricSnapshot, PageSeries, Severity};
use crate::error::{DecayError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use database::{Database, DbPool, DbStats};

/// SQLite file name inside the data directory
pub const DATABASE_FILE: &str = "pagedecay.sqlite";

/// Persisted decay flag for one page
#[derive(Debug, Clone, Serialize)]
pub struct DecayState {
    pub page_id: String,
    pub url: String,
    pub title: Option<String>,
    pub severity: Severity,
    pub decay_factors: Vec<DecayFactor>,
    /// When the page was first flagged in its current decaying streak
    pub detected_at: Option<DateTime<Utc>>,
}

/// Outcome of persisting one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub ran_at: DateTime<Utc>,
    pub pages_analyzed: usize,
    pub pages_decaying: usize,
    pub pages_cleared: usize,
}

/// Counts from an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub pages: usize,
    pub snapshots: usize,
}

/// Page metrics store backed by SQLite
pub struct DecayStore {
    pub database: Database,
    base_path: PathBuf,
}

impl DecayStore {
    /// Open the store under a data directory, creating it if needed
    pub fn open(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path).map_err(|e| DecayError::Io {
            source: e,
            context: format!("Failed to create data directory: {}", base_path.display()),
        })?;

        let database = Database::new(&base_path.join(DATABASE_FILE))?;

        Ok(Self {
            database,
            base_path,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Insert or update pages and their snapshots.
    ///
    /// Snapshots are keyed by (page, date); re-importing a date replaces it.
    pub fn import_series(&self, pages: &[PageSeries]) -> Result<ImportStats> {
        let mut conn = self.database.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let mut stats = ImportStats::default();

        {
            let mut upsert_page = tx.prepare(
                "INSERT INTO pages (id, url, title, page_type, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    page_type = excluded.page_type,
                    updated_at = excluded.updated_at",
            )?;
            let mut upsert_snapshot = tx.prepare(
                "INSERT INTO snapshots (page_id, date, clicks, impressions, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(page_id, date) DO UPDATE SET
                    clicks = excluded.clicks,
                    impressions = excluded.impressions,
                    position = excluded.position",
            )?;

            for page in pages {
                upsert_page.execute(params![
                    page.page_id,
                    page.url,
                    page.title,
                    page.page_type,
                    now
                ])?;
                stats.pages += 1;

                for snap in &page.snapshots {
                    upsert_snapshot.execute(params![
                        page.page_id,
                        snap.date,
                        count_to_sql(&page.page_id, "clicks", snap.clicks)?,
                        count_to_sql(&page.page_id, "impressions", snap.impressions)?,
                        snap.position
                    ])?;
                    stats.snapshots += 1;
                }
            }
        }

        tx.commit()?;
        tracing::info!(
            "Imported {} pages with {} snapshots",
            stats.pages,
            stats.snapshots
        );

        Ok(stats)
    }

    /// Load up to `limit` pages ordered by total clicks, highest first.
    ///
    /// With `since`, snapshots dated before it are left out of each history
    /// and of the click totals used to pick the pages.
    pub fn load_series(&self, limit: usize, since: Option<NaiveDate>) -> Result<Vec<PageSeries>> {
        let conn = self.database.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.url, p.title, p.page_type
             FROM pages p
             LEFT JOIN snapshots s
                ON s.page_id = p.id AND (?2 IS NULL OR s.date >= ?2)
             GROUP BY p.id
             ORDER BY COALESCE(SUM(s.clicks), 0) DESC, p.id ASC
             LIMIT ?1",
        )?;
        let mut pages = stmt
            .query_map(params![limit as i64, since], page_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for page in &mut pages {
            page.snapshots = load_snapshots(&conn, &page.page_id, since)?;
        }

        tracing::debug!("Loaded {} pages from store", pages.len());
        Ok(pages)
    }

    /// Load one page with its full history
    pub fn load_page(&self, page_id: &str) -> Result<PageSeries> {
        let conn = self.database.get_conn()?;

        let mut page = conn
            .query_row(
                "SELECT id, url, title, page_type FROM pages WHERE id = ?1",
                params![page_id],
                page_from_row,
            )
            .optional()?
            .ok_or_else(|| DecayError::PageNotFound {
                id: page_id.to_string(),
            })?;

        page.snapshots = load_snapshots(&conn, page_id, None)?;
        Ok(page)
    }

    /// Record the verdicts of one analysis run.
    ///
    /// Every page in `results` is flagged; pages in `analyzed` that are no
    /// longer decaying have their flag cleared. Pages outside `analyzed` are
    /// not touched.
    pub fn persist_run(
        &self,
        analyzed: &[PageSeries],
        results: &[DecayResult],
    ) -> Result<RunSummary> {
        let mut conn = self.database.get_conn()?;
        let tx = conn.transaction()?;
        let ran_at = Utc::now();
        let run_id = Uuid::new_v4();

        let decaying: HashSet<&str> = results.iter().map(|r| r.page_id.as_str()).collect();
        let mut pages_cleared = 0;

        {
            let mut clear = tx.prepare(
                "UPDATE pages SET
                    is_decaying = 0,
                    decay_severity = NULL,
                    decay_factors = NULL,
                    decay_detected_at = NULL,
                    updated_at = ?2
                 WHERE id = ?1 AND is_decaying = 1",
            )?;
            for page in analyzed {
                if !decaying.contains(page.page_id.as_str()) {
                    pages_cleared += clear.execute(params![page.page_id, ran_at])?;
                }
            }

            let mut ensure_page = tx.prepare(
                "INSERT INTO pages (id, url, title, page_type, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO NOTHING",
            )?;
            let mut flag = tx.prepare(
                "UPDATE pages SET
                    decay_detected_at = CASE WHEN is_decaying = 1 THEN decay_detected_at ELSE ?4 END,
                    is_decaying = 1,
                    decay_severity = ?2,
                    decay_factors = ?3,
                    updated_at = ?4
                 WHERE id = ?1",
            )?;
            for result in results {
                let factors =
                    serde_json::to_string(&result.decay_factors).map_err(|e| DecayError::Json {
                        source: e,
                        context: "Failed to serialize decay factors".to_string(),
                    })?;

                ensure_page.execute(params![
                    result.page_id,
                    result.url,
                    result.title,
                    result.page_type,
                    ran_at
                ])?;
                flag.execute(params![
                    result.page_id,
                    result.severity.as_str(),
                    factors,
                    ran_at
                ])?;
            }
        }

        let summary = RunSummary {
            run_id,
            ran_at,
            pages_analyzed: analyzed.len(),
            pages_decaying: results.len(),
            pages_cleared,
        };

        tx.execute(
            "INSERT INTO decay_runs (id, ran_at, pages_analyzed, pages_decaying, pages_cleared)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id.to_string(),
                ran_at,
                summary.pages_analyzed as i64,
                summary.pages_decaying as i64,
                summary.pages_cleared as i64
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            run_id = %run_id,
            "Persisted decay run: {} flagged, {} cleared",
            summary.pages_decaying,
            summary.pages_cleared
        );

        Ok(summary)
    }

    /// Pages currently flagged as decaying, most severe first
    pub fn decaying_pages(&self) -> Result<Vec<DecayState>> {
        let conn = self.database.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, title, decay_severity, decay_factors, decay_detected_at
             FROM pages
             WHERE is_decaying = 1
             ORDER BY CASE decay_severity
                 WHEN 'critical' THEN 0
                 WHEN 'high' THEN 1
                 ELSE 2
             END, url ASC",
        )?;

        let states = stmt
            .query_map([], state_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(states)
    }

    /// Most recent analysis runs, newest first
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let conn = self.database.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, ran_at, pages_analyzed, pages_decaying, pages_cleared
             FROM decay_runs
             ORDER BY ran_at DESC
             LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                let id: String = row.get(0)?;
                let run_id = Uuid::parse_str(&id).map_err(|e| conversion_error(0, e))?;
                Ok(RunSummary {
                    run_id,
                    ran_at: row.get(1)?,
                    pages_analyzed: row.get::<_, i64>(2)? as usize,
                    pages_decaying: row.get::<_, i64>(3)? as usize,
                    pages_cleared: row.get::<_, i64>(4)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    pub fn stats(&self) -> Result<DbStats> {
        self.database.stats()
    }
}

fn count_to_sql(page_id: &str, field: &str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| {
        DecayError::InvalidInput(format!(
            "{} for page {} exceeds the storable range: {}",
            field, page_id, value
        ))
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageSeries> {
    Ok(PageSeries {
        page_id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        page_type: row.get(3)?,
        snapshots: Vec::new(),
    })
}

fn load_snapshots(
    conn: &rusqlite::Connection,
    page_id: &str,
    since: Option<NaiveDate>,
) -> Result<Vec<MetricSnapshot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT date, clicks, impressions, position
         FROM snapshots
         WHERE page_id = ?1 AND (?2 IS NULL OR date >= ?2)
         ORDER BY date ASC",
    )?;

    let snapshots = stmt
        .query_map(params![page_id, since], |row| {
            Ok(MetricSnapshot {
                date: row.get(0)?,
                clicks: row.get(1)?,
                impressions: row.get(2)?,
                position: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(snapshots)
}

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<DecayState> {
    let severity: String = row.get(3)?;
    let severity = Severity::parse(&severity).ok_or_else(|| {
        conversion_error(3, DecayError::InvalidInput(format!("Unknown severity: {}", severity)))
    })?;

    let factors: Option<String> = row.get(4)?;
    let decay_factors = match factors {
        Some(json) => serde_json::from_str(&json).map_err(|e| conversion_error(4, e))?,
        None => Vec::new(),
    };

    Ok(DecayState {
        page_id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        severity,
        decay_factors,
        detected_at: row.get(5)?,
    })
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
