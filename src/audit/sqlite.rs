//! SQLite Execution Log
//!
//! Information Hiding:
//! - Table layout and JSON column encoding hidden from users
//! - Blocking connection access moved off the async runtime
//! - Row order (insertion id) defines entry order

use super::{ExecutionLog, ExecutionLogEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS execution_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    tool_id TEXT NOT NULL,
    parameters TEXT NOT NULL,
    result TEXT NOT NULL
)";

/// Durable log; one row per dispatch attempt
pub struct SqliteLog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit directory {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open audit database {:?}", path))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to initialize audit schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ExecutionLog for SqliteLog {
    async fn append(&self, entry: ExecutionLogEntry) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let parameters = serde_json::to_string(&entry.parameters)?;
        let result = serde_json::to_string(&entry.result)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("audit connection lock poisoned"))?;
            conn.execute(
                "INSERT INTO execution_log (timestamp, tool_id, parameters, result)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.timestamp.to_rfc3339(), entry.tool_id, parameters, result],
            )
            .context("Failed to append audit entry")?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    async fn entries(&self) -> Result<Vec<ExecutionLogEntry>> {
        let conn = Arc::clone(&self.conn);

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<(String, String, String, String)>> {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("audit connection lock poisoned"))?;
            let mut stmt = conn.prepare(
                "SELECT timestamp, tool_id, parameters, result FROM execution_log ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await??;

        rows.into_iter()
            .map(|(timestamp, tool_id, parameters, result)| {
                Ok(ExecutionLogEntry {
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .context("Corrupt audit timestamp")?
                        .with_timezone(&Utc),
                    tool_id,
                    parameters: serde_json::from_str(&parameters)
                        .context("Corrupt audit parameters")?,
                    result: serde_json::from_str(&result).context("Corrupt audit result")?,
                })
            })
            .collect()
    }

    async fn len(&self) -> Result<usize> {
        let conn = Arc::clone(&self.conn);
        let count = tokio::task::spawn_blocking(move || -> Result<i64> {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("audit connection lock poisoned"))?;
            Ok(conn.query_row("SELECT COUNT(*) FROM execution_log", [], |row| row.get(0))?)
        })
        .await??;
        Ok(count as usize)
    }
}
