//! Error types for the persistence layer.

use thiserror::Error;

/// Coarse classification of a [`StoreError`], independent of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or empty required field. Caller error, not retried.
    InvalidInput,
    /// Uniqueness violation on create.
    Conflict,
    /// No row matches the requested key.
    NotFound,
    /// Connection, initialization or I/O failure.
    StoreUnavailable,
}

/// Persistence error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field is missing or empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The `(user_name, analysis_id)` pair already exists.
    #[error("conversation already exists for user {user_name} and analysis {analysis_id}")]
    Conflict {
        /// Owning user.
        user_name: String,
        /// Analysis session identifier.
        analysis_id: String,
    },
    /// No matching row.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Entity name (`conversation`, `user`).
        entity: &'static str,
        /// Lookup key rendered for display.
        key: String,
    },
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// I/O error while preparing the backing directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Sqlite(_) | Self::TokioSqlite(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::StoreUnavailable
            }
        }
    }

    pub(crate) fn conversation_not_found(user_name: &str, analysis_id: &str) -> Self {
        Self::NotFound {
            entity: "conversation",
            key: format!("{user_name}/{analysis_id}"),
        }
    }

    pub(crate) fn user_not_found(user_name: &str) -> Self {
        Self::NotFound {
            entity: "user",
            key: user_name.to_string(),
        }
    }
}

/// Convenience result alias for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Whether a driver error is a UNIQUE or PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => matches!(
            failure.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_driver_failures_as_unavailable() {
        let err = StoreError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        let err = StoreError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn not_found_message_names_the_key() {
        let err = StoreError::conversation_not_found("alice", "a1");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "conversation not found: alice/a1");
    }

    #[test]
    fn unique_violation_detection() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('x');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO t VALUES ('x')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&rusqlite::Error::InvalidQuery));
    }
}
