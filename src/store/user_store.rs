//! Users and their session state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::store::database::{format_timestamp, parse_timestamp, Database};
use crate::store::errors::{StoreError, StoreResult};
use crate::store::schema::{CONVERSATIONS_TABLE, USERS_TABLE};
use crate::store::StoreFuture;

/// A user row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Unique, immutable identifier.
    pub user_name: String,
    /// Most recently created, opened or updated analysis.
    ///
    /// Not cleared when that conversation is deleted.
    pub current_analysis_id: Option<String>,
    /// First login.
    pub created_at: DateTime<Utc>,
    /// Latest login.
    pub last_active_at: DateTime<Utc>,
}

/// One conversation in a [`SessionsView`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Analysis session identifier.
    pub analysis_id: String,
    /// Last mutation time of the conversation.
    pub updated_at: DateTime<Utc>,
}

/// Session state of a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionsView {
    /// User identifier.
    pub user_name: String,
    /// Current analysis pointer.
    pub current_analysis_id: Option<String>,
    /// Latest login.
    pub last_active_at: DateTime<Utc>,
    /// The user's conversations, most recently updated first.
    pub conversations: Vec<SessionSummary>,
}

/// User repository.
pub trait UserStore: Send + Sync {
    /// Return the user named `user_name` (trimmed), creating it on first login.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a blank name, or an error if storage access fails.
    fn login_or_create(&self, user_name: &str) -> StoreFuture<'_, StoreResult<User>>;

    /// Current pointer, last activity and conversation list of a user.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown user, or an error if storage access fails.
    fn get_sessions(&self, user_name: &str) -> StoreFuture<'_, StoreResult<SessionsView>>;
}

/// `SQLite` implementation of the user repository.
pub struct SqliteUserStore {
    db: Arc<Database>,
}

impl SqliteUserStore {
    /// Wrap a store handle.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl UserStore for SqliteUserStore {
    fn login_or_create(&self, user_name: &str) -> StoreFuture<'_, StoreResult<User>> {
        let user_name = user_name.trim().to_string();
        Box::pin(async move {
            if user_name.is_empty() {
                return Err(StoreError::InvalidInput("userName is required".to_string()));
            }

            let conn = self.db.acquire().await?;
            let now = self.db.now();
            let (user, created) = conn
                .call(move |conn| {
                    let stamp = format_timestamp(now);
                    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                    let outcome = if select_user(&tx, &user_name)?.is_none() {
                        tx.execute(
                            &format!(
                                "INSERT INTO {USERS_TABLE} (userName, createdAt, lastActiveAt)
                                 VALUES (?1, ?2, ?2)"
                            ),
                            rusqlite::params![user_name, stamp],
                        )?;
                        let user = User {
                            user_name,
                            current_analysis_id: None,
                            created_at: now,
                            last_active_at: now,
                        };
                        (user, true)
                    } else {
                        tx.execute(
                            &format!("UPDATE {USERS_TABLE} SET lastActiveAt = ?1 WHERE userName = ?2"),
                            rusqlite::params![stamp, user_name],
                        )?;
                        let user = select_user(&tx, &user_name)?
                            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                        (user, false)
                    };
                    tx.commit()?;
                    Ok(outcome)
                })
                .await?;

            if created {
                info!(user_name = %user.user_name, "User created");
            } else {
                debug!(user_name = %user.user_name, "User logged in");
            }
            Ok(user)
        })
    }

    fn get_sessions(&self, user_name: &str) -> StoreFuture<'_, StoreResult<SessionsView>> {
        let user_name = user_name.to_string();
        Box::pin(async move {
            let conn = self.db.acquire().await?;
            let lookup = user_name.clone();
            let view = conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let Some(user) = select_user(&tx, &lookup)? else {
                        return Ok(None);
                    };
                    let conversations = {
                        let mut stmt = tx.prepare(&format!(
                            "SELECT analysisId, updatedAt FROM {CONVERSATIONS_TABLE}
                             WHERE userName = ?1
                             ORDER BY updatedAt DESC, id DESC"
                        ))?;
                        stmt.query_map(rusqlite::params![lookup], |row| {
                            let updated_at: String = row.get(1)?;
                            Ok(SessionSummary {
                                analysis_id: row.get(0)?,
                                updated_at: parse_timestamp(1, &updated_at)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?
                    };
                    tx.commit()?;
                    Ok(Some(SessionsView {
                        user_name: user.user_name,
                        current_analysis_id: user.current_analysis_id,
                        last_active_at: user.last_active_at,
                        conversations,
                    }))
                })
                .await?;

            view.ok_or_else(|| StoreError::user_not_found(&user_name))
        })
    }
}

/// Point a user's current analysis at `analysis_id`. No-op for unknown users.
pub(crate) fn set_current_analysis(
    conn: &Connection,
    user_name: &str,
    analysis_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("UPDATE {USERS_TABLE} SET currentAnalysisId = ?1 WHERE userName = ?2"),
        rusqlite::params![analysis_id, user_name],
    )
}

fn select_user(conn: &Connection, user_name: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!(
            "SELECT userName, currentAnalysisId, createdAt, lastActiveAt
             FROM {USERS_TABLE} WHERE userName = ?1"
        ),
        rusqlite::params![user_name],
        |row| {
            let created_at: String = row.get(2)?;
            let last_active_at: String = row.get(3)?;
            Ok(User {
                user_name: row.get(0)?,
                current_analysis_id: row.get(1)?,
                created_at: parse_timestamp(2, &created_at)?,
                last_active_at: parse_timestamp(3, &last_active_at)?,
            })
        },
    )
    .optional()
}
