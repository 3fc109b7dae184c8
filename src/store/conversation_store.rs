//! Conversation documents: one per user per analysis session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};

use crate::store::database::{format_timestamp, parse_timestamp, Database};
use crate::store::errors::{is_unique_violation, StoreError, StoreResult};
use crate::store::json::JsonDocument;
use crate::store::schema::CONVERSATIONS_TABLE;
use crate::store::user_store::set_current_analysis;
use crate::store::StoreFuture;

const COLUMNS: &str =
    "id, userName, analysisId, analysisData, chatMessages, beautyPlan, createdAt, updatedAt";

/// A stored conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    /// Surrogate key, assigned on insert and never reused.
    pub id: i64,
    /// Owning user.
    pub user_name: String,
    /// Analysis session identifier.
    pub analysis_id: String,
    /// Analysis document.
    pub analysis_data: JsonDocument,
    /// Chat transcript, normally a JSON array.
    pub chat_messages: JsonDocument,
    /// Derived plan document.
    pub beauty_plan: JsonDocument,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

/// Input for [`ConversationStore::create`].
#[derive(Clone, Debug, Default)]
pub struct NewConversation {
    /// Owning user. Must not be empty.
    pub user_name: String,
    /// Analysis session identifier. Must not be empty.
    pub analysis_id: String,
    /// Stored as `null` when absent.
    pub analysis_data: Option<JsonDocument>,
    /// Stored as `[]` when absent.
    pub chat_messages: Option<JsonDocument>,
    /// Stored as `null` when absent.
    pub beauty_plan: Option<JsonDocument>,
}

impl NewConversation {
    /// Start a conversation with only its key.
    #[must_use]
    pub fn new(user_name: impl Into<String>, analysis_id: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            analysis_id: analysis_id.into(),
            ..Self::default()
        }
    }

    /// Set the analysis document.
    #[must_use]
    pub fn with_analysis_data(mut self, doc: JsonDocument) -> Self {
        self.analysis_data = Some(doc);
        self
    }

    /// Set the chat transcript.
    #[must_use]
    pub fn with_chat_messages(mut self, doc: JsonDocument) -> Self {
        self.chat_messages = Some(doc);
        self
    }

    /// Set the plan document.
    #[must_use]
    pub fn with_beauty_plan(mut self, doc: JsonDocument) -> Self {
        self.beauty_plan = Some(doc);
        self
    }
}

/// Partial update for [`ConversationStore::update`].
///
/// Each present field replaces the stored value whole; absent fields are kept.
#[derive(Clone, Debug, Default)]
pub struct ConversationPatch {
    /// Replacement analysis document.
    pub analysis_data: Option<JsonDocument>,
    /// Replacement chat transcript.
    pub chat_messages: Option<JsonDocument>,
    /// Replacement plan document.
    pub beauty_plan: Option<JsonDocument>,
}

impl ConversationPatch {
    /// Replace the analysis document.
    #[must_use]
    pub fn with_analysis_data(mut self, doc: JsonDocument) -> Self {
        self.analysis_data = Some(doc);
        self
    }

    /// Replace the chat transcript.
    #[must_use]
    pub fn with_chat_messages(mut self, doc: JsonDocument) -> Self {
        self.chat_messages = Some(doc);
        self
    }

    /// Replace the plan document.
    #[must_use]
    pub fn with_beauty_plan(mut self, doc: JsonDocument) -> Self {
        self.beauty_plan = Some(doc);
        self
    }

    /// Whether no field is set. An empty patch still refreshes `updated_at`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.analysis_data.is_none() && self.chat_messages.is_none() && self.beauty_plan.is_none()
    }
}

/// Conversation repository.
///
/// `create`, `get` and `update` also point the owning user's current analysis
/// at the touched conversation, in the same transaction as the main statement.
pub trait ConversationStore: Send + Sync {
    /// All conversations of a user, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_by_user(&self, user_name: &str) -> StoreFuture<'_, StoreResult<Vec<Conversation>>>;

    /// Fetch one conversation and make it the user's current analysis.
    ///
    /// # Errors
    /// Returns `NotFound` if absent, or an error if storage access fails.
    fn get(
        &self,
        user_name: &str,
        analysis_id: &str,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Insert a conversation and make it the user's current analysis.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an empty key, `Conflict` if the pair exists,
    /// or an error if storage access fails.
    fn create(&self, new: NewConversation) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Apply a partial update and make it the user's current analysis.
    ///
    /// # Errors
    /// Returns `NotFound` if absent, or an error if storage access fails.
    fn update(
        &self,
        user_name: &str,
        analysis_id: &str,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Delete a conversation. User pointers referencing it are left as is.
    ///
    /// # Errors
    /// Returns `NotFound` if absent, or an error if storage access fails.
    fn delete(&self, user_name: &str, analysis_id: &str) -> StoreFuture<'_, StoreResult<()>>;
}

/// `SQLite` implementation of the conversation repository.
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    /// Wrap a store handle.
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn list_by_user(&self, user_name: &str) -> StoreFuture<'_, StoreResult<Vec<Conversation>>> {
        let user_name = user_name.to_string();
        Box::pin(async move {
            let conn = self.db.acquire().await?;
            let rows = conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {COLUMNS} FROM {CONVERSATIONS_TABLE}
                         WHERE userName = ?1
                         ORDER BY updatedAt DESC, id DESC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![user_name], row_to_conversation)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            Ok(rows)
        })
    }

    fn get(
        &self,
        user_name: &str,
        analysis_id: &str,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        let user_name = user_name.to_string();
        let analysis_id = analysis_id.to_string();
        Box::pin(async move {
            let conn = self.db.acquire().await?;
            let (user, analysis) = (user_name.clone(), analysis_id.clone());
            let found = conn
                .call(move |conn| {
                    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                    let found = select_conversation(&tx, &user, &analysis)?;
                    if found.is_some() {
                        set_current_analysis(&tx, &user, &analysis)?;
                    }
                    tx.commit()?;
                    Ok(found)
                })
                .await?;

            found.ok_or_else(|| StoreError::conversation_not_found(&user_name, &analysis_id))
        })
    }

    fn create(&self, new: NewConversation) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            if new.user_name.is_empty() || new.analysis_id.is_empty() {
                return Err(StoreError::InvalidInput(
                    "userName and analysisId are required".to_string(),
                ));
            }

            let conn = self.db.acquire().await?;
            let now = self.db.now();
            let user_name = new.user_name.clone();
            let analysis_id = new.analysis_id.clone();

            // `None` means the pair already exists.
            let created = conn
                .call(move |conn| {
                    let analysis_data = new.analysis_data.unwrap_or_else(JsonDocument::null);
                    let chat_messages = new.chat_messages.unwrap_or_else(JsonDocument::empty_array);
                    let beauty_plan = new.beauty_plan.unwrap_or_else(JsonDocument::null);
                    let stamp = format_timestamp(now);

                    let tx = conn.transaction()?;
                    let inserted = tx.execute(
                        &format!(
                            "INSERT INTO {CONVERSATIONS_TABLE}
                             (userName, analysisId, analysisData, chatMessages, beautyPlan, createdAt, updatedAt)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
                        ),
                        rusqlite::params![
                            new.user_name,
                            new.analysis_id,
                            analysis_data,
                            chat_messages,
                            beauty_plan,
                            stamp
                        ],
                    );
                    match inserted {
                        Err(err) if is_unique_violation(&err) => return Ok(None),
                        other => {
                            other?;
                        }
                    }
                    let id = tx.last_insert_rowid();
                    set_current_analysis(&tx, &new.user_name, &new.analysis_id)?;
                    tx.commit()?;

                    Ok(Some(Conversation {
                        id,
                        user_name: new.user_name,
                        analysis_id: new.analysis_id,
                        analysis_data,
                        chat_messages,
                        beauty_plan,
                        created_at: now,
                        updated_at: now,
                    }))
                })
                .await?;

            match created {
                Some(conversation) => {
                    debug!(
                        user_name = %conversation.user_name,
                        analysis_id = %conversation.analysis_id,
                        id = conversation.id,
                        "Conversation created"
                    );
                    Ok(conversation)
                }
                None => {
                    warn!(user_name = %user_name, analysis_id = %analysis_id, "Conversation already exists");
                    Err(StoreError::Conflict {
                        user_name,
                        analysis_id,
                    })
                }
            }
        })
    }

    fn update(
        &self,
        user_name: &str,
        analysis_id: &str,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        let user_name = user_name.to_string();
        let analysis_id = analysis_id.to_string();
        Box::pin(async move {
            let conn = self.db.acquire().await?;
            let stamp = format_timestamp(self.db.now());
            let empty_patch = patch.is_empty();
            let (user, analysis) = (user_name.clone(), analysis_id.clone());

            let updated = conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let changed = tx.execute(
                        &format!(
                            "UPDATE {CONVERSATIONS_TABLE}
                             SET analysisData = COALESCE(?1, analysisData),
                                 chatMessages = COALESCE(?2, chatMessages),
                                 beautyPlan = COALESCE(?3, beautyPlan),
                                 updatedAt = ?4
                             WHERE userName = ?5 AND analysisId = ?6"
                        ),
                        rusqlite::params![
                            patch.analysis_data,
                            patch.chat_messages,
                            patch.beauty_plan,
                            stamp,
                            user,
                            analysis
                        ],
                    )?;
                    if changed == 0 {
                        return Ok(None);
                    }
                    let updated = select_conversation(&tx, &user, &analysis)?;
                    set_current_analysis(&tx, &user, &analysis)?;
                    tx.commit()?;
                    Ok(updated)
                })
                .await?;

            let updated = updated
                .ok_or_else(|| StoreError::conversation_not_found(&user_name, &analysis_id))?;
            debug!(
                user_name = %user_name,
                analysis_id = %analysis_id,
                empty_patch,
                "Conversation updated"
            );
            Ok(updated)
        })
    }

    fn delete(&self, user_name: &str, analysis_id: &str) -> StoreFuture<'_, StoreResult<()>> {
        let user_name = user_name.to_string();
        let analysis_id = analysis_id.to_string();
        Box::pin(async move {
            let conn = self.db.acquire().await?;
            let (user, analysis) = (user_name.clone(), analysis_id.clone());
            let removed = conn
                .call(move |conn| {
                    Ok(conn.execute(
                        &format!(
                            "DELETE FROM {CONVERSATIONS_TABLE} WHERE userName = ?1 AND analysisId = ?2"
                        ),
                        rusqlite::params![user, analysis],
                    )?)
                })
                .await?;

            if removed == 0 {
                return Err(StoreError::conversation_not_found(&user_name, &analysis_id));
            }
            debug!(user_name = %user_name, analysis_id = %analysis_id, "Conversation deleted");
            Ok(())
        })
    }
}

fn select_conversation(
    conn: &Connection,
    user_name: &str,
    analysis_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM {CONVERSATIONS_TABLE} WHERE userName = ?1 AND analysisId = ?2"
        ),
        rusqlite::params![user_name, analysis_id],
        row_to_conversation,
    )
    .optional()
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Conversation {
        id: row.get(0)?,
        user_name: row.get(1)?,
        analysis_id: row.get(2)?,
        analysis_data: row.get(3)?,
        chat_messages: row.get(4)?,
        beauty_plan: row.get(5)?,
        created_at: parse_timestamp(6, &created_at)?,
        updated_at: parse_timestamp(7, &updated_at)?,
    })
}
