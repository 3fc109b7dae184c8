//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::store::{
    ConversationStore, Database, SqliteConversationStore, SqliteUserStore, UserStore,
};

/// Shared application state.
pub struct AppState {
    /// Store handle, closed on shutdown.
    pub db: Arc<Database>,
    /// Conversation repository.
    pub conversations: Arc<dyn ConversationStore>,
    /// User repository.
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Build the `SQLite` repositories over one store handle.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        let conversations = Arc::new(SqliteConversationStore::new(Arc::clone(&db)));
        let users = Arc::new(SqliteUserStore::new(Arc::clone(&db)));
        Arc::new(Self {
            db,
            conversations,
            users,
        })
    }
}
