//! SQLite history of evaluation runs. Each run keeps its headline counts in
//! columns and the full result document as JSON.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use credeval_types::EvaluationResult;

#[derive(Debug)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntity {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub threshold: u8,
    pub scored_count: usize,
    pub failure_count: usize,
}

impl Store {
    /// Open a store at the given path (e.g., "credeval.db")
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL,
                threshold INTEGER NOT NULL,
                scored_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                result TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Persist a run and return its id.
    pub fn record_run(&self, result: &EvaluationResult) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let json = serde_json::to_string(result)?;
        conn.execute(
            "INSERT INTO runs (created_at, threshold, scored_count, failure_count, result)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().to_rfc3339(),
                result.threshold_used,
                result.scored_count as i64,
                result.failure_count as i64,
                json
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn list_runs(&self) -> Result<Vec<RunEntity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, threshold, scored_count, failure_count
             FROM runs ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, created_at, threshold, scored_count, failure_count) = row?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc);
            runs.push(RunEntity {
                id,
                created_at,
                threshold: threshold as u8,
                scored_count: scored_count as usize,
                failure_count: failure_count as usize,
            });
        }
        Ok(runs)
    }

    /// Load the full result document for one run.
    pub fn get_result(&self, id: i64) -> Result<Option<EvaluationResult>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row("SELECT result FROM runs WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
