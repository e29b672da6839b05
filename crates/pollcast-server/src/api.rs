use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use pollcast_core::{PollId, PollSnapshot};
use pollcast_store::StateStore;
use serde::Serialize;
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::identity;
use crate::AppState;

// ── API types ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    poll_id: String,
    share_url: String,
}

#[derive(Serialize)]
pub struct PollResponse {
    poll: PollSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: &'static str,
    uptime_seconds: u64,
    polls: u64,
    rooms: usize,
    connections: usize,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn create_poll<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let body = parse_body(&body)?;

    let question = body
        .get("question")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    // Non-string options count as empty and fail validation.
    let options = body
        .get("options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default();

    let poll = state.registrar.create_poll(question, options).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            poll_id: poll.id().to_string(),
            share_url: share_url(&state.config, &headers, poll.id()),
        }),
    ))
}

pub async fn get_poll<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<PollResponse>, AppError> {
    let id: PollId = id.parse()?;
    let poll = state.registrar.fetch_poll(id).await?;
    Ok(Json(PollResponse { poll }))
}

pub async fn vote<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PollResponse>, AppError> {
    let id: PollId = id.parse()?;
    let body = parse_body(&body)?;
    let voter = identity::resolve_voter(&headers, peer.map(|ConnectInfo(addr)| addr), &state.config)?;

    let poll = state
        .registrar
        .register_vote(id, body.get("optionIndex"), voter)
        .await?;
    Ok(Json(PollResponse { poll }))
}

pub async fn status<S: StateStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StatusResponse>, AppError> {
    let polls = state.registrar.poll_count().await?;
    Ok(Json(StatusResponse {
        status: "ok",
        uptime_seconds: state.uptime().as_secs(),
        polls,
        rooms: state.broadcaster.rooms().room_count(),
        connections: state.broadcaster.connection_count(),
    }))
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::InvalidBody)
}

/// Link to the poll page: configured base url, else the forwarded or direct
/// host, else a relative path.
pub(crate) fn share_url(config: &ServerConfig, headers: &HeaderMap, id: PollId) -> String {
    let path = format!("/poll/{id}");
    if let Some(base) = &config.public_base_url {
        return format!("{}{path}", base.trim_end_matches('/'));
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("https");
    match header("x-forwarded-host").or_else(|| header("host")) {
        Some(host) => format!("{proto}://{host}{path}"),
        None => path,
    }
}
