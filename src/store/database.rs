//! Store handle owning the single `SQLite` connection.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tokio_rusqlite::Connection;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::store::errors::StoreResult;
use crate::store::schema::ensure_schema;

/// Shared handle to the conversation database.
///
/// The connection is opened lazily on the first [`Database::acquire`] and the
/// schema is ensured exactly once per open. [`Database::close`] releases it;
/// the next `acquire` opens a fresh connection.
///
/// Write-ahead logging is enabled, so the database lives in three files (see
/// [`Database::artifacts`]) that must be copied together.
pub struct Database {
    path: PathBuf,
    conn: AsyncMutex<Option<Connection>>,
    last_stamp_ms: Mutex<i64>,
}

impl Database {
    /// Create a closed handle for the configured path.
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            path: config.sqlite_path.clone(),
            conn: AsyncMutex::new(None),
            last_stamp_ms: Mutex::new(i64::MIN),
        }
    }

    /// Create a handle and open it immediately.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(config: &StorageConfig) -> StoreResult<Arc<Self>> {
        let db = Arc::new(Self::new(config));
        db.acquire().await?;
        Ok(db)
    }

    /// Main database file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Main file, write-ahead log and shared-memory index, in that order.
    #[must_use]
    pub fn artifacts(&self) -> [PathBuf; 3] {
        let with_suffix = |suffix: &str| {
            let mut name = self.path.clone().into_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        [self.path.clone(), with_suffix("-wal"), with_suffix("-shm")]
    }

    /// Return the live connection, opening it first if needed.
    ///
    /// # Errors
    /// Returns an error if the directory, file or schema cannot be created.
    pub async fn acquire(&self) -> StoreResult<Connection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = open_connection(&self.path).await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Close the connection if open. A later `acquire` re-initializes.
    ///
    /// # Errors
    /// Returns an error if `SQLite` refuses to close.
    pub async fn close(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await?;
            info!(path = %self.path.display(), "Database closed");
        }
        Ok(())
    }

    /// Whether a connection is currently held.
    pub async fn is_open(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Current time, strictly later than any value previously issued by this handle.
    pub(crate) fn now(&self) -> DateTime<Utc> {
        let mut last = self
            .last_stamp_ms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let wall = Utc::now();
        let next = wall.timestamp_millis().max(last.saturating_add(1));
        *last = next;
        DateTime::from_timestamp_millis(next).unwrap_or(wall)
    }
}

async fn open_connection(path: &Path) -> StoreResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path).await?;
    let journal_mode = conn
        .call(|conn| {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            ensure_schema(conn)?;
            Ok(mode)
        })
        .await?;

    if !journal_mode.eq_ignore_ascii_case("wal") {
        warn!(path = %path.display(), journal_mode = %journal_mode, "Write-ahead logging unavailable");
    }
    info!(path = %path.display(), "Database opened");
    Ok(conn)
}

/// Render a timestamp as stored: ISO-8601 UTC with milliseconds and `Z`.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp column.
pub(crate) fn parse_timestamp(idx: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
        })
}

#[cfg(test)]
pub(crate) async fn test_database() -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        sqlite_path: dir.path().join("conversations.db"),
    };
    let db = Database::open(&config).await.unwrap();
    (dir, db)
}
