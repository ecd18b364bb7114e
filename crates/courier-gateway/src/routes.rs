//! REST routes over the messaging engine.
//!
//! All routes require a session token (see [`crate::auth`]) and count
//! against the caller's rate budget: `POST /v1/messages` draws from the
//! send budget, every other route from the read budget.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use courier_core::{AccountId, EngineStatus, MessagingEngine};
use courier_store::{Conversation, MessageId, MessageQuery, PlaintextMessage};

use crate::auth::SessionTable;
use crate::error::{GatewayError, Result};
use crate::ratelimit::{OpClass, RateLimiter};

/// Shared handler state.
#[derive(Clone)]
pub struct GatewayState {
    /// The engine being exposed.
    pub engine: Arc<MessagingEngine>,
    /// Session token table.
    pub sessions: Arc<SessionTable>,
    /// Per-identity rate limiter.
    pub limiter: Arc<RateLimiter>,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/v1/conversations", get(list_conversations))
        .route("/v1/conversations/:peer", get(get_conversation))
        .route("/v1/conversations/:peer/archive", post(archive_conversation))
        .route("/v1/conversations/:peer/mute", post(mute_conversation))
        .route("/v1/conversations/:peer/messages", get(list_messages))
        .route("/v1/conversations/:peer/read", post(mark_read))
        .route("/v1/messages", post(send_message))
        .route("/v1/status", get(status))
        .route("/v1/keys/publish", post(publish_key))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    id: String,
    conversation_id: String,
    sender_id: u64,
    recipient_id: u64,
    text: String,
    embeds: Vec<String>,
    reply_to: Option<String>,
    timestamp: u64,
    is_read: bool,
}

impl From<&PlaintextMessage> for MessageView {
    fn from(message: &PlaintextMessage) -> Self {
        Self {
            id: message.id.to_hex(),
            conversation_id: message.conversation_id.to_string(),
            sender_id: message.sender_id.get(),
            recipient_id: message.recipient_id.get(),
            text: message.text.clone(),
            embeds: message.embeds.clone(),
            reply_to: message.reply_to.map(|id| id.to_hex()),
            timestamp: message.timestamp,
            is_read: message.is_read,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationView {
    peer_id: u64,
    unread_count: u64,
    last_message: Option<MessageView>,
    created_at: u64,
    updated_at: u64,
    is_archived: bool,
    is_muted: bool,
}

impl ConversationView {
    fn from_conversation(conversation: &Conversation, local: AccountId) -> Self {
        let peer = conversation
            .id
            .peer_of(local)
            .map_or(0, |peer| peer.get());
        Self {
            peer_id: peer,
            unread_count: conversation.unread_count,
            last_message: conversation.last_message.as_ref().map(MessageView::from),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
            is_archived: conversation.is_archived,
            is_muted: conversation.is_muted,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListConversationsQuery {
    #[serde(default)]
    include_archived: bool,
}

#[derive(Debug, Deserialize)]
struct ListMessagesQuery {
    before: Option<String>,
    after: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    recipient_id: u64,
    text: String,
    #[serde(default)]
    embeds: Vec<String>,
    #[serde(default)]
    reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlagBody {
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn gate(state: &GatewayState, headers: &HeaderMap, class: OpClass) -> Result<AccountId> {
    let account = state.sessions.authenticate(headers)?;
    if !state.limiter.check(account, class) {
        return Err(GatewayError::RateLimited);
    }
    Ok(account)
}

fn parse_peer(raw: &str) -> Result<AccountId> {
    raw.parse::<u64>()
        .ok()
        .and_then(|id| AccountId::new(id).ok())
        .ok_or_else(|| GatewayError::BadRequest(format!("invalid peer id '{}'", raw)))
}

fn parse_cursor(raw: Option<String>, name: &str) -> Result<Option<MessageId>> {
    match raw {
        None => Ok(None),
        Some(value) => MessageId::from_hex(&value)
            .map(Some)
            .ok_or_else(|| GatewayError::BadRequest(format!("invalid '{}' cursor", name))),
    }
}

async fn list_conversations(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<Vec<ConversationView>>> {
    gate(&state, &headers, OpClass::Read)?;
    let local = state.engine.local_id();
    let conversations = state.engine.list_conversations(query.include_archived).await?;
    Ok(Json(
        conversations
            .iter()
            .map(|c| ConversationView::from_conversation(c, local))
            .collect(),
    ))
}

async fn get_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(peer): Path<String>,
) -> Result<Json<ConversationView>> {
    gate(&state, &headers, OpClass::Read)?;
    let peer = parse_peer(&peer)?;
    let conversation = state
        .engine
        .conversation(peer)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("no conversation with {}", peer)))?;
    Ok(Json(ConversationView::from_conversation(
        &conversation,
        state.engine.local_id(),
    )))
}

async fn archive_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    body: Option<Json<FlagBody>>,
) -> Result<StatusCode> {
    gate(&state, &headers, OpClass::Read)?;
    let peer = parse_peer(&peer)?;
    let enabled = body.map_or(true, |Json(body)| body.enabled);
    state.engine.set_archived(peer, enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mute_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    body: Option<Json<FlagBody>>,
) -> Result<StatusCode> {
    gate(&state, &headers, OpClass::Read)?;
    let peer = parse_peer(&peer)?;
    let enabled = body.map_or(true, |Json(body)| body.enabled);
    state.engine.set_muted(peer, enabled).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(peer): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageView>>> {
    gate(&state, &headers, OpClass::Read)?;
    let peer = parse_peer(&peer)?;
    let message_query = MessageQuery {
        before: parse_cursor(query.before, "before")?,
        after: parse_cursor(query.after, "after")?,
        limit: query.limit,
    };
    let messages = state.engine.get_messages(peer, &message_query).await?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}

async fn mark_read(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(peer): Path<String>,
) -> Result<Json<serde_json::Value>> {
    gate(&state, &headers, OpClass::Read)?;
    let peer = parse_peer(&peer)?;
    let flipped = state.engine.mark_read(peer).await?;
    Ok(Json(serde_json::json!({ "markedRead": flipped })))
}

async fn send_message(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<MessageView>)> {
    gate(&state, &headers, OpClass::Send)?;
    let recipient = AccountId::new(body.recipient_id)
        .map_err(|_| GatewayError::BadRequest("recipientId must be positive".into()))?;
    let reply_to = parse_cursor(body.reply_to, "replyTo")?;

    let message = state
        .engine
        .send(recipient, &body.text, body.embeds, reply_to)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageView::from(&message))))
}

async fn status(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<EngineStatus>> {
    gate(&state, &headers, OpClass::Read)?;
    Ok(Json(state.engine.status().await))
}

async fn publish_key(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    gate(&state, &headers, OpClass::Read)?;
    let key_hex = state.engine.publish_encryption_key().await?;
    Ok(Json(
        serde_json::json!({ "encryptionPublicKey": key_hex }),
    ))
}
