//! HTTP gateway over the session orchestrator.
//!
//! Thin glue built on axum. Request handlers speak only the session's
//! public interface (register, evaluate, status queries, start, reset),
//! and `GET /api/events` bridges the listener channels onto Server-Sent
//! Events: each connection registers its own forwarding listeners and an
//! RAII guard unregisters them when the stream drops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatch::{Channel, Listener, ListenerHandle};
use crate::error::GatewayError;
use crate::observability::metrics::set_sse_connections;
use crate::roster::Standing;
use crate::session::{AnswerSubmission, Session, SessionSettings};

/// Depth of each event stream connection's forwarding queue. A stalled
/// consumer loses events beyond this rather than blocking a fire.
const STREAM_QUEUE_DEPTH: usize = 32;

/// Shared state between the axum handlers.
struct GatewayState {
    session: Arc<Session>,
    open_streams: AtomicU64,
}

// ============================================================================
// Request / Response Payloads
// ============================================================================

/// Body of `POST /api/players`.
#[derive(Debug, Deserialize)]
struct JoinRequest {
    nickname: String,
    avatar: Option<String>,
}

/// Body of `POST /api/answers`.
#[derive(Debug, Deserialize)]
struct AnswerRequest {
    player: String,
    question_id: String,
    option: String,
}

/// Body of `POST /api/session/reset`. Every field is optional; omitted
/// fields carry over from the settings currently installed.
#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    total_questions: Option<usize>,
    question_time_secs: Option<u64>,
    score_time_secs: Option<u64>,
    register_wait_time_secs: Option<u64>,
}

/// Settings as applied, echoed back by start and reset responses.
#[derive(Debug, Serialize)]
struct AppliedSettings {
    total_questions: usize,
    question_time_secs: u64,
    score_time_secs: u64,
    register_wait_time_secs: u64,
}

impl From<SessionSettings> for AppliedSettings {
    fn from(settings: SessionSettings) -> Self {
        Self {
            total_questions: settings.total_questions,
            question_time_secs: settings.question_time.as_secs(),
            score_time_secs: settings.score_time.as_secs(),
            register_wait_time_secs: settings.register_wait_time.as_secs(),
        }
    }
}

/// Which listener channels an event stream connection subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StreamRole {
    /// A playing client: question prompts, standings, tallies, the end.
    #[default]
    Player,
    /// A shared scoreboard display: standings, tallies, the end.
    Board,
}

impl StreamRole {
    const fn channels(self) -> &'static [Channel] {
        match self {
            Self::Player => &[
                Channel::Question,
                Channel::Score,
                Channel::Graphic,
                Channel::End,
            ],
            Self::Board => &[Channel::Score, Channel::Graphic, Channel::End],
        }
    }
}

/// Query string of `GET /api/events`.
#[derive(Debug, Default, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    role: StreamRole,
}

// ============================================================================
// Axum Router
// ============================================================================

/// Builds the axum router over a shared session.
pub fn build_router(session: Arc<Session>) -> Router {
    let state = Arc::new(GatewayState {
        session,
        open_streams: AtomicU64::new(0),
    });
    Router::new()
        .route("/api/players", post(handle_join))
        .route("/api/answers", post(handle_answer))
        .route("/api/session", get(handle_status))
        .route("/api/session/start", post(handle_start))
        .route("/api/session/reset", post(handle_reset))
        .route("/api/standings", get(handle_standings))
        .route("/api/question", get(handle_question))
        .route("/api/events", get(handle_events))
        .with_state(state)
}

/// `POST /api/players` handler.
///
/// First contact starts the session, opening the join window; the
/// registration itself then succeeds only while that window is open.
async fn handle_join(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<JoinRequest>,
) -> Response {
    let nickname = req.nickname.trim();
    if nickname.is_empty() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "empty nickname").into_response();
    }

    state.session.start();
    if !state.session.waiting_for_players() {
        return (StatusCode::FORBIDDEN, "registration closed").into_response();
    }
    if state.session.register_player(nickname, req.avatar.clone()) {
        let standing = Standing {
            nickname: nickname.to_owned(),
            avatar: req.avatar,
            score: 0,
        };
        (StatusCode::CREATED, Json(standing)).into_response()
    } else {
        (StatusCode::CONFLICT, "nickname taken").into_response()
    }
}

/// `POST /api/answers` handler.
///
/// Returns the updated question snapshot, or 204 when the submission
/// was silently ignored (unknown player, stale question, repeat).
async fn handle_answer(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<AnswerRequest>,
) -> Response {
    let submission = AnswerSubmission {
        question_id: req.question_id,
        option: req.option,
    };
    match state.session.evaluate(&req.player, &submission) {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /api/session` handler.
async fn handle_status(State(state): State<Arc<GatewayState>>) -> Response {
    Json(state.session.status()).into_response()
}

/// `POST /api/session/start` handler. Idempotent: a session already
/// past `new` is left alone.
async fn handle_start(State(state): State<Arc<GatewayState>>) -> Response {
    state.session.start();
    (StatusCode::ACCEPTED, Json(state.session.status())).into_response()
}

/// `POST /api/session/reset` handler.
///
/// Fields omitted from the body carry over from the settings currently
/// installed; the response echoes the settings as applied (the question
/// count may come back clamped).
async fn handle_reset(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ResetRequest>,
) -> Response {
    let mut settings = state.session.settings();
    if let Some(total) = req.total_questions {
        settings.total_questions = total;
    }
    if let Some(secs) = req.question_time_secs {
        settings.question_time = Duration::from_secs(secs);
    }
    if let Some(secs) = req.score_time_secs {
        settings.score_time = Duration::from_secs(secs);
    }
    if let Some(secs) = req.register_wait_time_secs {
        settings.register_wait_time = Duration::from_secs(secs);
    }
    let applied = state.session.reset(settings);
    (StatusCode::OK, Json(AppliedSettings::from(applied))).into_response()
}

/// `GET /api/standings` handler.
async fn handle_standings(State(state): State<Arc<GatewayState>>) -> Response {
    Json(state.session.standings()).into_response()
}

/// `GET /api/question` handler.
///
/// Serves the prompt of the question in play (no correct answer in the
/// payload), or 404 outside the question loop.
async fn handle_question(State(state): State<Arc<GatewayState>>) -> Response {
    match state.session.current_question() {
        Some(prompt) => Json(prompt).into_response(),
        None => (StatusCode::NOT_FOUND, "no question in play").into_response(),
    }
}

// ============================================================================
// Event Stream
// ============================================================================

/// RAII guard that unregisters a connection's listeners on drop.
///
/// Ensures listener cleanup on all exit paths (client disconnect, server
/// shutdown, panic) in the stream pipeline.
struct StreamGuard {
    state: Arc<GatewayState>,
    handles: Vec<ListenerHandle>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        for handle in &self.handles {
            // returns false when a session reset already wiped the
            // registration; nothing further to clean up then
            self.state.session.unlisten(handle);
        }
        let open = self
            .state
            .open_streams
            .fetch_sub(1, Ordering::SeqCst)
            .saturating_sub(1);
        set_sse_connections(open);
        debug!(open, "event stream closed");
    }
}

/// `GET /api/events` handler.
///
/// Registers forwarding listeners for the requested role's channels and
/// returns a Server-Sent Events stream of their fires, each event a JSON
/// object carrying a `type` tag. The forwarding queue is bounded; a
/// consumer that stops reading loses events rather than blocking fires.
async fn handle_events(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, std::convert::Infallible>>>
{
    let (tx, rx) = mpsc::channel::<String>(STREAM_QUEUE_DEPTH);

    let mut handles = Vec::new();
    for &channel in query.role.channels() {
        let tx = tx.clone();
        let forward: Listener = Arc::new(move |event| {
            if let Ok(payload) = serde_json::to_string(event) {
                // Full or Closed both mean this connection misses the
                // event; the fire itself proceeds untouched
                let _ = tx.try_send(payload);
            }
        });
        if let Some(handle) = state.session.listen(forward, channel) {
            handles.push(handle);
        }
    }

    let open = state.open_streams.fetch_add(1, Ordering::SeqCst) + 1;
    set_sse_connections(open);
    debug!(role = ?query.role, open, "event stream opened");

    let guard = StreamGuard {
        state: Arc::clone(&state),
        handles,
    };
    let stream = ReceiverStream::new(rx).map(move |payload| {
        // the map closure owns the guard; dropping the stream runs it
        let _ = &guard;
        Ok(SseEvent::default().data(payload))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ============================================================================
// Server
// ============================================================================

/// Binds the gateway and serves until `cancel` fires.
///
/// Binding to port 0 picks a free port; the bound address is logged.
///
/// # Errors
///
/// Returns a [`GatewayError`] if the bind address is invalid, the TCP
/// listener cannot bind, or the server fails while running.
pub async fn run(
    bind_addr: &str,
    session: Arc<Session>,
    cancel: CancellationToken,
) -> std::result::Result<(), GatewayError> {
    let addr = parse_bind_addr(bind_addr)?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::BindFailed(e.to_string()))?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| GatewayError::BindFailed(format!("local_addr failed: {e}")))?;

    let router = build_router(session);
    info!(%bound_addr, "gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .map_err(|e| GatewayError::ServeFailed(e.to_string()))?;
    debug!("gateway shut down");
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses a bind address string into a full `host:port` form.
///
/// Accepts:
/// - `:8080` → `0.0.0.0:8080`
/// - `8080` → `0.0.0.0:8080`
/// - `1.2.3.4:8080` → as-is
///
/// # Errors
///
/// Returns [`GatewayError::InvalidBindAddr`] if the result cannot be
/// parsed as a valid socket address.
pub fn parse_bind_addr(input: &str) -> std::result::Result<String, GatewayError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|_| GatewayError::InvalidBindAddr(input.to_string()))?;
    Ok(addr)
}

// ============================================================================
// Tests
// ============================================================================
