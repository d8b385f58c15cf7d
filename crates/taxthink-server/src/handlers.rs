//! REST handlers, one per route. Repositories are cheap handles over the
//! shared connection and are constructed per call.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use taxthink_advisor::ConversationService;
use taxthink_core::chat::ChatMessage;
use taxthink_core::reply::{MessageMetadata, StructuredReply};
use taxthink_core::types::{Currency, Jurisdiction, Role, SessionStatus};
use taxthink_store::messages::{MessageRepo, MessageRow};
use taxthink_store::session_data::{SessionDataRepo, SessionDatumRow};
use taxthink_store::sessions::{SessionPatch, SessionRepo, SessionRow};
use taxthink_store::{Database, StoreError};

use crate::error::{ApiError, JsonBody};

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub advisor: Arc<ConversationService>,
}

/// Run a store operation, retrying exactly once if the backend reports
/// itself unavailable.
fn retry_once<T>(op: impl Fn() -> Result<T, StoreError>) -> Result<T, StoreError> {
    match op() {
        Err(StoreError::Unavailable(detail)) => {
            tracing::warn!(%detail, "store unavailable, retrying once");
            op()
        }
        other => other,
    }
}

// ── Request/response bodies (wire names are camelCase) ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    pub title: String,
    #[serde(default)]
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub currency: Currency,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session: SessionRow,
    pub welcome_message: StructuredReply,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionBody {
    pub title: Option<String>,
    pub jurisdiction: Option<Jurisdiction>,
    pub currency: Option<Currency>,
    pub status: Option<SessionStatus>,
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub user_message: MessageRow,
    pub assistant_message: MessageRow,
    pub ai_response: StructuredReply,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertDatumBody {
    pub category: String,
    pub data_key: String,
    pub data_value: serde_json::Value,
}

// ── Sessions ──

/// POST /api/sessions: create a session and persist its welcome message as
/// the first assistant turn.
pub async fn create_session(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateSessionBody>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let sessions = SessionRepo::new(state.db.clone());
    let session = retry_once(|| sessions.create(&body.title, body.jurisdiction, body.currency))?;

    let welcome = state
        .advisor
        .welcome_message(session.jurisdiction, session.currency);

    let messages = MessageRepo::new(state.db.clone());
    retry_once(|| {
        messages.create(
            session.id,
            Role::Assistant,
            &welcome.content,
            Some(&MessageMetadata::from_welcome_reply(&welcome)),
        )
    })?;

    tracing::info!(session_id = session.id, "session created");
    Ok(Json(CreateSessionResponse {
        session,
        welcome_message: welcome,
    }))
}

/// GET /api/sessions: every session, most recently touched first.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<Vec<SessionRow>>, ApiError> {
    let sessions = SessionRepo::new(state.db.clone());
    Ok(Json(retry_once(|| sessions.list())?))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SessionRow>, ApiError> {
    let sessions = SessionRepo::new(state.db.clone());
    Ok(Json(retry_once(|| sessions.get(id))?))
}

/// PATCH /api/sessions/{id}: merge partial fields, refresh `updatedAt`.
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateSessionBody>,
) -> Result<Json<SessionRow>, ApiError> {
    let patch = SessionPatch {
        title: body.title,
        jurisdiction: body.jurisdiction,
        currency: body.currency,
        status: body.status,
    };
    let sessions = SessionRepo::new(state.db.clone());
    Ok(Json(retry_once(|| sessions.update(id, patch.clone()))?))
}

// ── Messages ──

/// GET /api/sessions/{id}/messages: chronological; empty for unknown
/// sessions.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let messages = MessageRepo::new(state.db.clone());
    Ok(Json(retry_once(|| messages.list_for_session(id))?))
}

/// POST /api/sessions/{id}/messages: persist the user turn, generate the
/// assistant turn from stored history, persist it, touch the session.
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<SendMessageBody>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let sessions = SessionRepo::new(state.db.clone());
    let messages = MessageRepo::new(state.db.clone());

    let session = retry_once(|| sessions.get(id))?;

    let user_message = retry_once(|| messages.create(id, Role::User, &body.content, None))?;

    // History is rebuilt from the store on every call; it already contains
    // the user turn persisted above.
    let stored = retry_once(|| messages.list_for_session(id))?;
    let history: Vec<ChatMessage> = stored
        .iter()
        .map(|m| match m.role {
            Role::User => ChatMessage::user(m.content.clone()),
            Role::Assistant => ChatMessage::assistant(m.content.clone()),
        })
        .collect();

    let reply = state
        .advisor
        .generate_response(session.jurisdiction, session.currency, &body.content, &history)
        .await?;

    let assistant_message = retry_once(|| {
        messages.create(
            id,
            Role::Assistant,
            &reply.content,
            Some(&MessageMetadata::from_reply(&reply)),
        )
    })?;

    retry_once(|| sessions.update(id, SessionPatch::default()))?;

    Ok(Json(SendMessageResponse {
        user_message,
        assistant_message,
        ai_response: reply,
    }))
}

// ── Session data ──

/// POST /api/sessions/{id}/data: upsert by (session, category, key).
pub async fn upsert_session_datum(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpsertDatumBody>,
) -> Result<Json<SessionDatumRow>, ApiError> {
    let data = SessionDataRepo::new(state.db.clone());
    let datum =
        retry_once(|| data.upsert(id, &body.category, &body.data_key, &body.data_value))?;
    Ok(Json(datum))
}

/// GET /api/sessions/{id}/data
pub async fn list_session_data(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SessionDatumRow>>, ApiError> {
    let data = SessionDataRepo::new(state.db.clone());
    Ok(Json(retry_once(|| data.list(id, None))?))
}

/// GET /api/sessions/{id}/data/{category}
pub async fn list_session_data_by_category(
    State(state): State<AppState>,
    Path((id, category)): Path<(i64, String)>,
) -> Result<Json<Vec<SessionDatumRow>>, ApiError> {
    let data = SessionDataRepo::new(state.db.clone());
    Ok(Json(retry_once(|| data.list(id, Some(&category)))?))
}

// ── Health ──

/// GET /health: verifies the store answers a trivial query.
pub async fn health(State(state): State<AppState>) -> axum::response::Response {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    let reachable = state
        .db
        .with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(StoreError::from)
        })
        .is_ok();

    if reachable {
        (StatusCode::OK, Json(serde_json::json!({ "status": "healthy" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unhealthy" })),
        )
            .into_response()
    }
}
