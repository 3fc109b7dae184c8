//! Persistence layer for conversations and user session state.
//!
//! - `schema`: table and index creation
//! - `database`: the store handle owning the single connection
//! - `conversation_store`: conversation documents
//! - `user_store`: login and session state
//! - `json`: opaque JSON text columns
//! - `errors`: error taxonomy

pub mod conversation_store;
pub mod database;
pub mod errors;
pub mod json;
pub mod schema;
pub mod user_store;

use std::future::Future;
use std::pin::Pin;

/// Boxed future type for repository operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use conversation_store::{
    Conversation, ConversationPatch, ConversationStore, NewConversation, SqliteConversationStore,
};
pub use database::Database;
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use json::JsonDocument;
pub use schema::ensure_schema;
pub use user_store::{SessionSummary, SessionsView, SqliteUserStore, User, UserStore};
