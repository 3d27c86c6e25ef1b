//! libSQL-backed task and blob stores.
//!
//! One database holds both the `tasks` and `blobs` tables. A single
//! connection is kept behind a mutex so each trait call, including the
//! read-check-write of a status update, runs without interleaving.

use crate::tasks::error::StoreError;
use crate::tasks::store::{BlobStore, TaskStore};
use crate::tasks::task::{NewTask, Task, TaskStatus};
use crate::types::{TaskHandle, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database};
use serde_json::Value;
use std::fmt;
use tokio::sync::Mutex;

/// Database schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

const CREATE_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    owner_thread_id TEXT NOT NULL,
    tool_call_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    args TEXT NOT NULL,
    handle TEXT NOT NULL,
    status TEXT NOT NULL,
    result_blob_path TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner_thread_id ON tasks(owner_thread_id);
CREATE INDEX IF NOT EXISTS idx_tasks_handle ON tasks(handle);

CREATE TABLE IF NOT EXISTS blobs (
    handle TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

const TASK_COLUMNS: &str = "id, owner_thread_id, tool_call_id, tool_name, args, handle, status, \
                            result_blob_path, created_at, updated_at";

/// Task and blob store on a local libSQL database.
pub struct LibSqlStore {
    db_path: String,
    _database: Database,
    conn: Mutex<Connection>,
}

impl fmt::Debug for LibSqlStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibSqlStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl LibSqlStore {
    /// Opens (or creates) the database at `db_path` and initializes the schema.
    ///
    /// `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be created.
    pub async fn open(db_path: impl Into<String>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        let database = libsql::Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| StoreError::database_open(&db_path, e.to_string()))?;
        let conn = database
            .connect()
            .map_err(|e| StoreError::database_open(&db_path, e.to_string()))?;

        initialize_schema(&conn).await?;
        tracing::debug!(db_path = %db_path, "Task database ready");

        Ok(Self {
            db_path,
            _database: database,
            conn: Mutex::new(conn),
        })
    }

    /// Returns the path the store was opened with.
    #[must_use]
    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

async fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(CREATE_SCHEMA)
        .await
        .map_err(|e| StoreError::schema_init(e.to_string()))?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )
    .await
    .map_err(|e| StoreError::schema_init(e.to_string()))?;

    Ok(())
}

async fn fetch_task(
    conn: &Connection,
    operation: &'static str,
    id: &TaskId,
) -> Result<Option<Task>, StoreError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    let mut rows = conn
        .query(&sql, [id.to_string()])
        .await
        .map_err(|e| StoreError::query_failed(operation, e.to_string()))?;

    match rows
        .next()
        .await
        .map_err(|e| StoreError::query_failed(operation, e.to_string()))?
    {
        Some(row) => Ok(Some(task_from_row(operation, &row)?)),
        None => Ok(None),
    }
}

fn task_from_row(operation: &'static str, row: &libsql::Row) -> Result<Task, StoreError> {
    let text = |idx: i32| -> Result<String, StoreError> {
        row.get::<String>(idx)
            .map_err(|e| StoreError::serialization(operation, e.to_string()))
    };

    let id = TaskId::parse(&text(0)?)
        .map_err(|e| StoreError::serialization(operation, e.to_string()))?;
    let args: Value = serde_json::from_str(&text(4)?)
        .map_err(|e| StoreError::serialization(operation, e.to_string()))?;
    let status: TaskStatus = text(6)?
        .parse()
        .map_err(|e: String| StoreError::serialization(operation, e))?;
    let result_blob_path: Option<String> = row
        .get(7)
        .map_err(|e| StoreError::serialization(operation, e.to_string()))?;

    Ok(Task {
        id,
        owner_thread_id: text(1)?,
        tool_call_id: text(2)?,
        tool_name: text(3)?,
        args,
        handle: TaskHandle::from_raw(text(5)?),
        status,
        result_blob_path,
        created_at: parse_timestamp(operation, &text(8)?)?,
        updated_at: parse_timestamp(operation, &text(9)?)?,
    })
}

fn parse_timestamp(operation: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::serialization(operation, e.to_string()))
}

#[async_trait]
impl TaskStore for LibSqlStore {
    async fn create_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let task = Task::pending(TaskId::new(), new);
        let args = serde_json::to_string(&task.args)
            .map_err(|e| StoreError::serialization("create_task", e.to_string()))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO tasks (id, owner_thread_id, tool_call_id, tool_name, args, handle, \
             status, result_blob_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)",
            libsql::params![
                task.id.to_string(),
                task.owner_thread_id.clone(),
                task.tool_call_id.clone(),
                task.tool_name.clone(),
                args,
                task.handle.to_string(),
                task.status.as_str().to_string(),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| StoreError::query_failed("create_task", e.to_string()))?;

        Ok(task)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.lock().await;
        fetch_task(&conn, "get_task", id).await
    }

    async fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let task = fetch_task(&conn, "update_task_status", id)
            .await?
            .ok_or_else(|| StoreError::task_not_found("update_task_status", id.clone()))?;

        if !task.status.can_transition_to(status) {
            return Err(StoreError::invalid_transition(id.clone(), task.status, status));
        }

        let blob_path = (status == TaskStatus::Completed).then(|| task.handle.to_string());
        conn.execute(
            "UPDATE tasks SET status = ?1, result_blob_path = COALESCE(?2, result_blob_path), \
             updated_at = ?3 WHERE id = ?4",
            libsql::params![
                status.as_str().to_string(),
                blob_path,
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .await
        .map_err(|e| StoreError::query_failed("update_task_status", e.to_string()))?;

        Ok(())
    }

    async fn list_thread_tasks(&self, thread_id: &str) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE owner_thread_id = ?1 ORDER BY id ASC");
        let mut rows = conn
            .query(&sql, [thread_id.to_string()])
            .await
            .map_err(|e| StoreError::query_failed("list_thread_tasks", e.to_string()))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::query_failed("list_thread_tasks", e.to_string()))?
        {
            tasks.push(task_from_row("list_thread_tasks", &row)?);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl BlobStore for LibSqlStore {
    async fn try_get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT payload FROM blobs WHERE handle = ?1", [key.to_string()])
            .await
            .map_err(|e| StoreError::query_failed("try_get", e.to_string()))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::query_failed("try_get", e.to_string()))?
        else {
            return Ok(None);
        };

        let payload: String = row
            .get(0)
            .map_err(|e| StoreError::serialization("try_get", e.to_string()))?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|e| StoreError::serialization("try_get", e.to_string()))
    }

    async fn put(&self, key: &str, payload: Value) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&payload)
            .map_err(|e| StoreError::serialization("put", e.to_string()))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO blobs (handle, payload) VALUES (?1, ?2)",
            [key.to_string(), payload],
        )
        .await
        .map_err(|e| StoreError::query_failed("put", e.to_string()))?;
        Ok(())
    }
}
