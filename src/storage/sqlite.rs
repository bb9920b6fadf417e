//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the StateStore trait.
//! A checkpoint rewrites the job's rows inside one transaction, so readers
//! and crash recovery only ever see whole snapshots.

use crate::config::JobConfig;
use crate::jobs::{JobId, JobState};
use crate::state::{CrawlState, CrawlTarget, DocumentEntry, DropCounts, PageOutcome};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StateStore, StoreError, StoreResult};
use crate::storage::JobRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// SQLite state store shared by all jobs of a process
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

/// Raw `jobs` row before validation
struct JobRow {
    status: String,
    error: Option<String>,
    created_at: String,
    config_json: String,
    root_url: String,
    max_depth: u32,
    max_pages: u32,
    delay_seconds: f64,
    pages_processed: u32,
    pages_failed: u32,
    dropped_json: String,
    started_at: String,
    last_checkpoint_at: Option<String>,
}

impl SqliteStateStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStateStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

impl StateStore for SqliteStateStore {
    fn save(&self, record: &JobRecord) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let job_id = record.job_id.to_string();
        let state = &record.state;

        tx.execute(
            "INSERT OR REPLACE INTO jobs (
                job_id, status, error, created_at, config_json, root_url, max_depth,
                max_pages, delay_seconds, pages_processed, pages_failed, dropped_json,
                started_at, last_checkpoint_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                job_id,
                record.status.to_db_string(),
                record.error,
                record.created_at.to_rfc3339(),
                serde_json::to_string(&record.config)?,
                state.root_url.as_str(),
                state.max_depth,
                state.max_pages,
                state.delay_seconds,
                state.pages_processed,
                state.pages_failed,
                serde_json::to_string(&state.dropped)?,
                state.started_at.to_rfc3339(),
                state.last_checkpoint_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        for table in ["frontier", "visited", "documents"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE job_id = ?1", table),
                params![job_id],
            )?;
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO frontier (job_id, position, url, depth, root) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, target) in state.frontier.iter().enumerate() {
                stmt.execute(params![
                    job_id,
                    position as i64,
                    target.url.as_str(),
                    target.depth,
                    target.root.as_str()
                ])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO visited (job_id, url, outcome) VALUES (?1, ?2, ?3)",
            )?;
            for (url, outcome) in &state.visited {
                stmt.execute(params![job_id, url, outcome.to_db_string()])?;
            }

            let mut stmt = tx.prepare_cached(
                "INSERT INTO documents (job_id, position, url, document_id, title) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, doc) in state.documents.iter().enumerate() {
                stmt.execute(params![
                    job_id,
                    position as i64,
                    doc.url,
                    doc.document_id,
                    doc.title
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load(&self, job_id: JobId) -> StoreResult<JobRecord> {
        let conn = self.lock()?;
        load_record(&conn, job_id)?.ok_or(StoreError::NotFound(job_id))
    }

    fn exists(&self, job_id: JobId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM jobs WHERE job_id = ?1",
                params![job_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list(&self) -> StoreResult<Vec<JobRecord>> {
        let conn = self.lock()?;
        let ids: Vec<String> = {
            let mut stmt = conn.prepare("SELECT job_id FROM jobs ORDER BY created_at, job_id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let mut records = Vec::with_capacity(ids.len());
        for raw in ids {
            let job_id: JobId = raw.parse().map_err(|e: uuid::Error| StoreError::Corrupt {
                job_id: raw.clone(),
                reason: e.to_string(),
            })?;
            if let Some(record) = load_record(&conn, job_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn delete(&self, job_id: JobId) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = job_id.to_string();
        for table in ["frontier", "visited", "documents", "jobs"] {
            tx.execute(&format!("DELETE FROM {} WHERE job_id = ?1", table), params![id])?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn load_record(conn: &Connection, job_id: JobId) -> StoreResult<Option<JobRecord>> {
    let id = job_id.to_string();
    let row = conn
        .query_row(
            "SELECT status, error, created_at, config_json, root_url, max_depth, max_pages,
             delay_seconds, pages_processed, pages_failed, dropped_json, started_at,
             last_checkpoint_at
             FROM jobs WHERE job_id = ?1",
            params![id],
            |row| {
                Ok(JobRow {
                    status: row.get(0)?,
                    error: row.get(1)?,
                    created_at: row.get(2)?,
                    config_json: row.get(3)?,
                    root_url: row.get(4)?,
                    max_depth: row.get(5)?,
                    max_pages: row.get(6)?,
                    delay_seconds: row.get(7)?,
                    pages_processed: row.get(8)?,
                    pages_failed: row.get(9)?,
                    dropped_json: row.get(10)?,
                    started_at: row.get(11)?,
                    last_checkpoint_at: row.get(12)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };
    let corrupt = |reason: String| StoreError::Corrupt {
        job_id: id.clone(),
        reason,
    };

    let status = JobState::from_db_string(&row.status)
        .ok_or_else(|| corrupt(format!("unknown status '{}'", row.status)))?;
    let config: JobConfig = serde_json::from_str(&row.config_json)?;
    let dropped: DropCounts = serde_json::from_str(&row.dropped_json)?;

    let mut frontier = VecDeque::new();
    {
        let mut stmt = conn.prepare_cached(
            "SELECT url, depth, root FROM frontier WHERE job_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for row in rows {
            let (url, depth, root) = row?;
            frontier.push_back(CrawlTarget {
                url: parse_url(&url).map_err(corrupt)?,
                depth,
                root: parse_url(&root).map_err(corrupt)?,
            });
        }
    }

    let mut visited = crate::state::VisitedSet::new();
    {
        let mut stmt = conn.prepare_cached("SELECT url, outcome FROM visited WHERE job_id = ?1")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (url, outcome) = row?;
            let outcome = PageOutcome::from_db_string(&outcome)
                .ok_or_else(|| corrupt(format!("unknown outcome '{}'", outcome)))?;
            visited.insert(url, outcome);
        }
    }

    let documents = {
        let mut stmt = conn.prepare_cached(
            "SELECT url, document_id, title FROM documents WHERE job_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(DocumentEntry {
                url: row.get(0)?,
                document_id: row.get(1)?,
                title: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let state = CrawlState {
        root_url: parse_url(&row.root_url).map_err(corrupt)?,
        max_depth: row.max_depth,
        max_pages: row.max_pages,
        delay_seconds: row.delay_seconds,
        frontier,
        visited,
        pages_processed: row.pages_processed,
        pages_failed: row.pages_failed,
        documents,
        dropped,
        started_at: parse_time(&row.started_at).map_err(corrupt)?,
        last_checkpoint_at: row
            .last_checkpoint_at
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(corrupt)?,
        pending: HashSet::new(),
    }
    .restore();

    Ok(Some(JobRecord {
        job_id,
        status,
        error: row.error,
        created_at: parse_time(&row.created_at).map_err(corrupt)?,
        config,
        state,
    }))
}

fn parse_url(s: &str) -> Result<Url, String> {
    Url::parse(s).map_err(|e| format!("bad url '{}': {}", s, e))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", s, e))
}
