//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Site-Scribe state database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per job: lifecycle, configuration and counters
CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    error TEXT,
    created_at TEXT NOT NULL,
    config_json TEXT NOT NULL,
    root_url TEXT NOT NULL,
    max_depth INTEGER NOT NULL,
    max_pages INTEGER NOT NULL,
    delay_seconds REAL NOT NULL,
    pages_processed INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    dropped_json TEXT NOT NULL,
    started_at TEXT NOT NULL,
    last_checkpoint_at TEXT
);

-- Pending URLs, in dequeue order
CREATE TABLE IF NOT EXISTS frontier (
    job_id TEXT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    root TEXT NOT NULL,
    PRIMARY KEY (job_id, position)
);

-- Processed URLs and their outcome
CREATE TABLE IF NOT EXISTS visited (
    job_id TEXT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    outcome TEXT NOT NULL,
    PRIMARY KEY (job_id, url)
);

-- Written documents, in processing order
CREATE TABLE IF NOT EXISTS documents (
    job_id TEXT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    document_id TEXT NOT NULL,
    title TEXT NOT NULL,
    PRIMARY KEY (job_id, position)
);

CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
