//! Chat assistant handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::today;
use crate::{AppError, AppState, AuthUser, SuccessResponse};
use tally_core::chat;
use tally_core::models::{Chat, ChatMessage, ChatRole, ChatWithMessages};
use tally_core::FinancialContext;

/// Longest accepted user message, in characters
const MAX_MESSAGE_CHARS: usize = 4000;

/// Request body for creating a chat
#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub share_financial_data: bool,
}

/// GET /api/chats - List the caller's chats
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Chat>>, AppError> {
    Ok(Json(state.db.list_chats(user.id)?))
}

/// POST /api/chats - Start a chat
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<Chat>, AppError> {
    let chat = state
        .db
        .create_chat(user.id, req.title.as_deref(), req.share_financial_data)?;

    state.db.log_audit(
        &user.email,
        "create",
        Some("chat"),
        Some(chat.id),
        Some(&format!("share_financial_data={}", chat.share_financial_data)),
    )?;

    Ok(Json(chat))
}

/// GET /api/chats/:id - Get a chat with its messages
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<ChatWithMessages>, AppError> {
    let chat = state
        .db
        .get_chat_with_messages(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Chat {} not found", id)))?;

    Ok(Json(chat))
}

/// DELETE /api/chats/:id - Delete a chat
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.delete_chat(user.id, id)? {
        return Err(AppError::not_found(&format!("Chat {} not found", id)));
    }

    state
        .db
        .log_audit(&user.email, "delete", Some("chat"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// Request body for a new message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// The stored user message and the assistant's reply
#[derive(Serialize)]
pub struct SendMessageResponse {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

/// POST /api/chats/:id/messages - Send a message and get the assistant's reply
///
/// The user message is stored before the backend is called, so it survives a
/// failed reply.
pub async fn send_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("Message content is required"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::bad_request(&format!(
            "Message is longer than {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let conversation = state
        .db
        .get_chat(user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Chat {} not found", id)))?;

    let user_message = state
        .db
        .add_chat_message(user.id, id, ChatRole::User, content)?;
    let history = state.db.list_chat_messages(id)?;

    let context = if conversation.share_financial_data {
        let accounts = state.db.list_accounts(user.id)?;
        let txs = state.db.all_transactions(user.id)?;
        let goals = state.db.list_goals(user.id)?;
        Some(FinancialContext::build(
            &accounts,
            &txs,
            &goals,
            today(),
            &state.classifier,
        ))
    } else {
        None
    };

    let reply = chat::reply(state.chat.as_ref(), context.as_ref(), &history).await?;
    let assistant_message = state
        .db
        .add_chat_message(user.id, id, ChatRole::Assistant, &reply)?;

    state.db.log_audit(
        &user.email,
        "message",
        Some("chat"),
        Some(id),
        Some(&format!("with_context={}", context.is_some())),
    )?;
    info!(chat_id = id, with_context = context.is_some(), "Chat reply stored");

    Ok(Json(SendMessageResponse {
        user_message,
        assistant_message,
    }))
}

/// Request body for toggling data sharing
#[derive(Debug, Deserialize)]
pub struct SharingRequest {
    pub enabled: bool,
}

/// PUT /api/chats/:id/sharing - Allow or stop replies reading financial data
pub async fn set_chat_sharing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SharingRequest>,
) -> Result<Json<Chat>, AppError> {
    let chat = state.db.set_chat_sharing(user.id, id, req.enabled)?;

    state.db.log_audit(
        &user.email,
        "update_sharing",
        Some("chat"),
        Some(id),
        Some(&format!("enabled={}", req.enabled)),
    )?;

    Ok(Json(chat))
}
