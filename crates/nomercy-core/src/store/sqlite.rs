//! SQLite-backed document store.
//!
//! Progression records are stored as JSON documents with denormalized
//! `experience`/`level` columns for leaderboard ordering. Tasks get one row
//! each, keyed by task id.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{data_dir, migrations, DocumentStore};
use crate::error::StoreError;
use crate::model::{ProgressionRecord, Task, TaskStatus};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at `<data_dir>/nomercy.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("nomercy.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrations::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn write_task(&self, sql: &str, task: &Task) -> Result<(), StoreError> {
        self.conn.execute(
            sql,
            params![
                task.id,
                task.owner_id,
                task.calendar_date.format("%Y-%m-%d").to_string(),
                task.text,
                task.status.as_str(),
                task.created_at.to_rfc3339(),
                task.resolved_at.map(|at| at.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn load(&self, user_id: &str) -> Result<Option<ProgressionRecord>, StoreError> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|doc| serde_json::from_str(&doc).map_err(StoreError::from))
            .transpose()
    }

    fn save(&self, user_id: &str, record: &ProgressionRecord) -> Result<(), StoreError> {
        let document = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO users (user_id, display_name, experience, level, document, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                experience   = excluded.experience,
                level        = excluded.level,
                document     = excluded.document,
                updated_at   = excluded.updated_at",
            params![
                user_id,
                record.display_name,
                record.experience(),
                record.level(),
                document,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_tasks(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, owner_id, calendar_date, text, status, created_at, resolved_at
             FROM tasks
             WHERE owner_id = ?1
             ORDER BY calendar_date, created_at",
        )?;
        let rows = stmt.query_map(params![user_id], raw_task)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(decode_task(row?)?);
        }
        Ok(tasks)
    }

    fn save_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_task(
            "INSERT INTO tasks (id, owner_id, calendar_date, text, status, created_at, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            task,
        )
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_task(
            "INSERT INTO tasks (id, owner_id, calendar_date, text, status, created_at, resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                text        = excluded.text,
                status      = excluded.status,
                resolved_at = excluded.resolved_at",
            task,
        )
    }

    fn top_by_experience(&self, limit: usize) -> Result<Vec<ProgressionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT document FROM users
             ORDER BY experience DESC, user_id
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for doc in rows {
            records.push(serde_json::from_str(&doc?)?);
        }
        Ok(records)
    }
}

/// Column values of one `tasks` row before decoding.
struct RawTask {
    id: String,
    owner_id: String,
    calendar_date: String,
    text: String,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
}

fn raw_task(row: &Row<'_>) -> rusqlite::Result<RawTask> {
    Ok(RawTask {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        calendar_date: row.get(2)?,
        text: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        resolved_at: row.get(6)?,
    })
}

fn decode_task(raw: RawTask) -> Result<Task, StoreError> {
    let calendar_date = NaiveDate::parse_from_str(&raw.calendar_date, "%Y-%m-%d")
        .map_err(|e| StoreError::Serialization(format!("task {}: calendar_date: {e}", raw.id)))?;
    let status = TaskStatus::parse(&raw.status).ok_or_else(|| {
        StoreError::Serialization(format!("task {}: unknown status '{}'", raw.id, raw.status))
    })?;
    let created_at = parse_instant(&raw.id, &raw.created_at)?;
    let resolved_at = raw
        .resolved_at
        .as_deref()
        .map(|at| parse_instant(&raw.id, at))
        .transpose()?;

    Ok(Task {
        id: raw.id,
        owner_id: raw.owner_id,
        calendar_date,
        text: raw.text,
        status,
        created_at,
        resolved_at,
    })
}

fn parse_instant(task_id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("task {task_id}: timestamp: {e}")))
}
