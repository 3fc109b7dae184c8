//! Schema setup for the conversation and user tables.

use rusqlite::Connection;
use tracing::info;

/// Conversations table name.
pub const CONVERSATIONS_TABLE: &str = "conversations";
/// Users table name.
pub const USERS_TABLE: &str = "users";

/// Create the tables and indexes if they do not exist yet.
///
/// Safe to call on every start and from several processes at once.
///
/// # Errors
/// Returns an error if any statement fails.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {CONVERSATIONS_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            userName TEXT NOT NULL,
            analysisId TEXT NOT NULL,
            analysisData TEXT,
            chatMessages TEXT NOT NULL,
            beautyPlan TEXT,
            createdAt TEXT NOT NULL,
            updatedAt TEXT NOT NULL,
            UNIQUE(userName, analysisId)
        );
        CREATE TABLE IF NOT EXISTS {USERS_TABLE} (
            userName TEXT PRIMARY KEY,
            currentAnalysisId TEXT,
            createdAt TEXT NOT NULL,
            lastActiveAt TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_userName
            ON {CONVERSATIONS_TABLE} (userName);
        CREATE INDEX IF NOT EXISTS idx_conversations_analysisId
            ON {CONVERSATIONS_TABLE} (analysisId);
        CREATE INDEX IF NOT EXISTS idx_conversations_updatedAt
            ON {CONVERSATIONS_TABLE} (updatedAt DESC);
        CREATE INDEX IF NOT EXISTS idx_users_lastActiveAt
            ON {USERS_TABLE} (lastActiveAt DESC);"
    ))?;

    info!("Database schema ready");
    Ok(())
}
