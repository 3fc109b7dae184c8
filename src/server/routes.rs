//! HTTP route handlers for the conversation API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::database::format_timestamp;
use crate::store::{
    Conversation, ConversationPatch, JsonDocument, NewConversation, SessionSummary, SessionsView,
    StoreError, User,
};

use super::error::{ApiError, ApiJson};
use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/conversations", post(create_conversation))
        .route("/api/conversations/{user_name}", get(list_conversations))
        .route(
            "/api/conversations/{user_name}/{analysis_id}",
            get(get_conversation)
                .put(update_conversation)
                .delete(delete_conversation),
        )
        .route("/api/users/login", post(login))
        .route("/api/users/{user_name}/sessions", get(get_sessions))
        .fallback(route_not_found)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": format_timestamp(Utc::now()),
        "service": "conversation-store",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn route_not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Route not found",
            "path": uri.path()
        })),
    )
}

/// Conversation as returned to clients, with documents parsed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    /// Surrogate key.
    pub id: i64,
    /// Owning user.
    pub user_name: String,
    /// Analysis session identifier.
    pub analysis_id: String,
    /// Analysis document.
    pub analysis_data: Value,
    /// Chat transcript.
    pub chat_messages: Value,
    /// Plan document.
    pub beauty_plan: Value,
    /// Insert time.
    pub created_at: String,
    /// Last mutation time.
    pub updated_at: String,
}

impl From<Conversation> for ConversationDto {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            user_name: c.user_name,
            analysis_id: c.analysis_id,
            analysis_data: c.analysis_data.to_value_lossy(),
            chat_messages: c.chat_messages.to_value_lossy(),
            beauty_plan: c.beauty_plan.to_value_lossy(),
            created_at: format_timestamp(c.created_at),
            updated_at: format_timestamp(c.updated_at),
        }
    }
}

/// Body of `POST /api/conversations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Owning user.
    pub user_name: Option<String>,
    /// Analysis session identifier.
    pub analysis_id: Option<String>,
    /// Analysis document.
    pub analysis_data: Option<Value>,
    /// Chat transcript.
    pub chat_messages: Option<Value>,
    /// Plan document.
    pub beauty_plan: Option<Value>,
}

/// Body of `PUT /api/conversations/{user_name}/{analysis_id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConversationRequest {
    /// Replacement analysis document.
    pub analysis_data: Option<Value>,
    /// Replacement chat transcript.
    pub chat_messages: Option<Value>,
    /// Replacement plan document.
    pub beauty_plan: Option<Value>,
}

fn to_document(value: Option<Value>) -> Result<Option<JsonDocument>, ApiError> {
    value
        .map(|v| JsonDocument::from_value(&v))
        .transpose()
        .map_err(|err| ApiError(StoreError::from(err)))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Path(user_name): Path<String>,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let conversations = state.conversations.list_by_user(&user_name).await?;
    Ok(Json(
        conversations.into_iter().map(ConversationDto::from).collect(),
    ))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path((user_name, analysis_id)): Path<(String, String)>,
) -> Result<Json<ConversationDto>, ApiError> {
    let conversation = state.conversations.get(&user_name, &analysis_id).await?;
    Ok(Json(conversation.into()))
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationDto>), ApiError> {
    let new = NewConversation {
        user_name: request.user_name.unwrap_or_default(),
        analysis_id: request.analysis_id.unwrap_or_default(),
        analysis_data: to_document(request.analysis_data)?,
        chat_messages: to_document(request.chat_messages)?,
        beauty_plan: to_document(request.beauty_plan)?,
    };
    let created = state.conversations.create(new).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn update_conversation(
    State(state): State<Arc<AppState>>,
    Path((user_name, analysis_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<UpdateConversationRequest>,
) -> Result<Json<ConversationDto>, ApiError> {
    let patch = ConversationPatch {
        analysis_data: to_document(request.analysis_data)?,
        chat_messages: to_document(request.chat_messages)?,
        beauty_plan: to_document(request.beauty_plan)?,
    };
    let updated = state
        .conversations
        .update(&user_name, &analysis_id, patch)
        .await?;
    Ok(Json(updated.into()))
}

async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path((user_name, analysis_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.conversations.delete(&user_name, &analysis_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body of `POST /api/users/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// User identifier, trimmed before use.
    pub user_name: Option<String>,
}

/// User as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    /// User identifier.
    pub user_name: String,
    /// Current analysis pointer.
    pub current_analysis_id: Option<String>,
    /// First login.
    pub created_at: String,
    /// Latest login.
    pub last_active_at: String,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            user_name: u.user_name,
            current_analysis_id: u.current_analysis_id,
            created_at: format_timestamp(u.created_at),
            last_active_at: format_timestamp(u.last_active_at),
        }
    }
}

/// Session list entry as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryDto {
    /// Analysis session identifier.
    pub analysis_id: String,
    /// Last mutation time.
    pub updated_at: String,
}

impl From<SessionSummary> for SessionSummaryDto {
    fn from(s: SessionSummary) -> Self {
        Self {
            analysis_id: s.analysis_id,
            updated_at: format_timestamp(s.updated_at),
        }
    }
}

/// Session state as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsDto {
    /// User identifier.
    pub user_name: String,
    /// Current analysis pointer.
    pub current_analysis_id: Option<String>,
    /// Latest login.
    pub last_active_at: String,
    /// Conversations, most recent first.
    pub conversations: Vec<SessionSummaryDto>,
}

impl From<SessionsView> for SessionsDto {
    fn from(v: SessionsView) -> Self {
        Self {
            user_name: v.user_name,
            current_analysis_id: v.current_analysis_id,
            last_active_at: format_timestamp(v.last_active_at),
            conversations: v.conversations.into_iter().map(Into::into).collect(),
        }
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<UserDto>, ApiError> {
    let user = state
        .users
        .login_or_create(request.user_name.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(user.into()))
}

async fn get_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_name): Path<String>,
) -> Result<Json<SessionsDto>, ApiError> {
    let view = state.users.get_sessions(&user_name).await?;
    Ok(Json(view.into()))
}
