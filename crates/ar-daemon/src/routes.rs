//! Axum router and all HTTP handlers for ar-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests in `tests/` compose the bare router directly.

use std::{convert::Infallible, sync::Arc};

use ar_announce::validate_peer_info;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error};

use crate::{
    api_types::{AutoretrieveListResponse, ErrorResponse, HealthResponse, StatusResponse},
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/autoretrieve/list", get(list_autoretrieves))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let sched = st.scheduler.borrow().clone();
    let head = match &st.provider {
        Some(p) => p.head_advertisement().await,
        None => None,
    };

    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            phase: sched.phase,
            last_tick: sched.last_tick,
            config_hash: st.info.config_hash.clone(),
            topic: st.info.topic.clone(),
            provider_peer_id: st.info.provider_peer_id.clone(),
            advertisement_head: head.as_ref().map(|(id, _)| id.to_string()),
            advertisement_entries: head.as_ref().map(|(_, ad)| ad.entries.len()),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/autoretrieve/list
// ---------------------------------------------------------------------------

/// Every registered front-end, online or not. A record whose key or
/// addresses no longer validate is still listed, with `addrInfo: null`.
pub(crate) async fn list_autoretrieves(State(st): State<Arc<AppState>>) -> Response {
    let front_ends = match st.store.list_registrations().await {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("{e:#}");
            error!(error = %msg, "autoretrieve/list: store listing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to list autoretrieve servers".to_string(),
                }),
            )
                .into_response();
        }
    };

    let rows: Vec<AutoretrieveListResponse> = front_ends
        .into_iter()
        .map(|fe| {
            let addr_info = match validate_peer_info(&fe.private_key, &fe.address_list()) {
                Ok(info) => Some(info.to_view()),
                Err(e) => {
                    debug!(handle = %fe.handle, error = %e, "listing front-end without addr info");
                    None
                }
            };
            AutoretrieveListResponse {
                handle: fe.handle,
                last_connection: fe.last_connection,
                last_advertisement: fe.last_advertisement,
                addr_info,
            }
        })
        .collect();

    (StatusCode::OK, Json(rows)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Tick(_) => "tick",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
