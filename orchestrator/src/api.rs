//! Public API Surface (C10): axum router exposing the five transport-agnostic
//! operations of §6.1, the push channel of §6.2, and the health/readiness/
//! metrics trio the canceler's `server.rs` always ships alongside them.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::{Coordinator, SessionEvent};
use crate::errors::CoordinatorError;
use crate::metrics;
use crate::notifier::{Channel, ListenerId, Notifier, PushMessage};
use crate::quote::{Quote, Quoter, Urgency};
use crate::secret::SecretManager;
use crate::store::SessionStore;
use crate::timelock::{compute_deadlines, TimelockConfig};
use crate::types::{CreateSessionRequest, Deadlines, Session, SessionSnapshot, SessionStatus};
use multichain_rs::ChainTag;

/// Per-session channels the coordinator's `drive` loop reads from. The
/// monitor dispatcher (wired in `main`) looks a session up by hashlock and
/// forwards matched events here; the API layer owns insert/remove so a
/// channel never outlives the session it belongs to.
pub type SessionChannels = Arc<RwLock<HashMap<String, mpsc::Sender<SessionEvent>>>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub secrets: Arc<SecretManager>,
    pub notifier: Arc<Notifier>,
    pub coordinator: Arc<Coordinator>,
    pub quoter: Arc<Quoter>,
    pub timelock: TimelockConfig,
    pub channels: SessionChannels,
    pub listener_seq: Arc<AtomicU64>,
}

impl AppState {
    /// Register the session's event channel and spawn its coordinator
    /// driver task. Called once, right after the session is persisted.
    pub async fn spawn_driver(&self, session_id: String) {
        let (tx, rx) = mpsc::channel(64);
        self.channels.write().await.insert(session_id.clone(), tx);
        let coordinator = Arc::clone(&self.coordinator);
        let channels = Arc::clone(&self.channels);
        let id_for_cleanup = session_id.clone();
        tokio::spawn(async move {
            coordinator.drive(session_id, rx).await;
            channels.write().await.remove(&id_for_cleanup);
        });
    }
}

/// Uniform error envelope for every C10 operation; `code` is the stable
/// string callers match on, `message` is for humans.
#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

struct ApiError(CoordinatorError);

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.code() {
            "SESSION_NOT_FOUND" => StatusCode::NOT_FOUND,
            "SESSION_INVALID_STATE" | "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "SESSION_LIMIT_REACHED" | "QUOTE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn validation(message: impl Into<String>) -> ApiError {
    ApiError(CoordinatorError::Validation(message.into()))
}

// ---- create_session ----------------------------------------------------

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    id: String,
    status: SessionStatus,
    hashlock_hex: String,
    deadlines: Deadlines,
    quote: Quote,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    if request.slippage_bps > 1000 {
        return Err(validation("slippage_bps must be between 0 and 1000"));
    }
    let source_chain = ChainTag::parse(&request.source_chain)
        .ok_or_else(|| validation("source_chain must be 'source' or 'destination'"))?;
    let destination_chain = ChainTag::parse(&request.destination_chain)
        .ok_or_else(|| validation("destination_chain must be 'source' or 'destination'"))?;
    let source_amount: u128 = request
        .source_amount
        .parse()
        .map_err(|_| validation("source_amount must be a decimal integer"))?;
    let destination_amount: u128 = request
        .destination_amount
        .parse()
        .map_err(|_| validation("destination_amount must be a decimal integer"))?;

    let now = Utc::now();
    let quote = state
        .quoter
        .quote(
            &request.source_chain,
            &request.destination_chain,
            &request.source_token,
            &request.destination_token,
            source_amount,
            Urgency::Normal,
            now,
            now,
        )
        .await?;

    let (_preimage, hashlock) = state
        .secrets
        .create()
        .map_err(|e| CoordinatorError::Validation(format!("secret generation failed: {e}")))?;
    // A rejected base duration is a safety-invariant violation at session
    // creation (§7): surfaced as `VALIDATION_ERROR` at this boundary per
    // §6.1's `create_session` error set, not the internal `INVALID_TIMEOUT`
    // code `TimelockError` carries.
    let deadlines = compute_deadlines(&state.timelock, request.base_duration_secs as i64, now)
        .map_err(|e| CoordinatorError::Validation(e.to_string()))?;
    let session = Session {
        id: Uuid::new_v4().to_string(),
        source_chain,
        destination_chain,
        source_token: request.source_token,
        destination_token: request.destination_token,
        source_amount,
        destination_amount,
        maker: request.maker,
        taker: request.taker,
        slippage_bps: request.slippage_bps,
        hashlock,
        status: SessionStatus::Initialized,
        phase_progress: 0,
        deadlines,
        created_at: now,
        updated_at: now,
        source_escrow_ref: None,
        destination_escrow_ref: None,
        revealed_secret: None,
        last_error: None,
        authorized: false,
    };
    session.check_invariants().map_err(CoordinatorError::Validation)?;

    state.store.put(session.clone())?;
    state.spawn_driver(session.id.clone()).await;
    metrics::record_session_created(&request.source_chain, &request.destination_chain);
    info!(session_id = %session.id, "session created");

    Ok(Json(CreateSessionResponse {
        id: session.id,
        status: session.status,
        hashlock_hex: multichain_rs::hash::bytes32_to_hex(&hashlock),
        deadlines,
        quote,
    }))
}

// ---- get_session ---------------------------------------------------------

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = state.store.get(&id).ok_or(CoordinatorError::SessionNotFound)?;
    Ok(Json(SessionSnapshot::from(&session)))
}

// ---- execute --------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[allow(dead_code)]
    signed_order: String,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    acknowledged: bool,
}

async fn execute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(_request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    state.store.get(&id).ok_or(CoordinatorError::SessionNotFound)?;
    state.coordinator.authorize(&id)?;
    Ok(Json(ExecuteResponse { acknowledged: true }))
}

// ---- cancel ---------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CancelResponse {
    acknowledged: bool,
    projected_refund_time: DateTime<Utc>,
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let session = state.coordinator.request_cancel(&id)?;
    Ok(Json(CancelResponse {
        acknowledged: true,
        projected_refund_time: session.deadlines.source_cancellation,
    }))
}

// ---- quote ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QuoteRequest {
    source_chain: String,
    destination_chain: String,
    source_token: String,
    destination_token: String,
    source_amount: String,
    urgency: Option<String>,
}

async fn get_quote(
    State(state): State<AppState>,
    axum::extract::Query(request): axum::extract::Query<QuoteRequest>,
) -> Result<Json<Quote>, ApiError> {
    let source_amount: u128 = request
        .source_amount
        .parse()
        .map_err(|_| validation("source_amount must be a decimal integer"))?;
    let urgency = request
        .urgency
        .as_deref()
        .map(|u| Urgency::parse(u).ok_or_else(|| validation("urgency must be fast, normal, or slow")))
        .transpose()?
        .unwrap_or(Urgency::Normal);

    let now = Utc::now();
    let quote = state
        .quoter
        .quote(
            &request.source_chain,
            &request.destination_chain,
            &request.source_token,
            &request.destination_token,
            source_amount,
            urgency,
            now,
            now,
        )
        .await?;
    metrics::QUOTES_SERVED.with_label_values(&[&format!("{urgency:?}").to_lowercase()]).inc();
    Ok(Json(quote))
}

// ---- health / readiness / metrics ------------------------------------------

async fn healthz() -> &'static str {
    "OK"
}

async fn readyz(State(_state): State<AppState>) -> &'static str {
    "OK"
}

async fn prometheus_metrics() -> Response {
    metrics::ACTIVE_SESSIONS.set(0.0);
    match metrics::encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---- push channel -----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Auth { token: String },
    Subscribe { channel: String, key: String },
    Unsubscribe { channel: String, key: String },
}

fn parse_channel(name: &str) -> Option<Channel> {
    match name {
        "session" => Some(Channel::Session),
        "prices" => Some(Channel::Prices),
        "alerts" => Some(Channel::Alerts),
        _ => None,
    }
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One push-channel connection's lifecycle: require an `Auth` handshake
/// first, then accept `Subscribe`/`Unsubscribe` messages and forward
/// whatever the notifier delivers until the socket closes.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let listener: ListenerId = format!("ws-{}", state.listener_seq.fetch_add(1, Ordering::Relaxed));

    let authed = match socket.recv().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Auth { token }) => !token.is_empty(),
            _ => false,
        },
        _ => false,
    };
    if !authed {
        let _ = socket
            .send(Message::Text(
                serde_json::to_string(&PushMessage::Alert {
                    session_id: None,
                    message: "authentication required".to_string(),
                })
                .unwrap_or_default()
                .into(),
            ))
            .await;
        return;
    }

    let mut rx = state.notifier.connect(listener.clone());
    info!(listener, "push channel connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { channel, key }) => {
                                if let Some(c) = parse_channel(&channel) {
                                    state.notifier.subscribe(&listener, c, &key);
                                }
                            }
                            Ok(ClientMessage::Unsubscribe { channel, key }) => {
                                if let Some(c) = parse_channel(&channel) {
                                    state.notifier.unsubscribe(&listener, c, &key);
                                }
                            }
                            Ok(ClientMessage::Auth { .. }) => {}
                            Err(e) => warn!(listener, error = %e, "malformed push-channel message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(listener, error = %e, "push channel read error");
                        break;
                    }
                    _ => {}
                }
            }
            message = rx.recv() => {
                match message {
                    Some(msg) => {
                        let text = serde_json::to_string(&msg).unwrap_or_default();
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.notifier.disconnect(&listener);
    info!(listener, "push channel disconnected");
}

/// Main listen-port router: the five C10 operations plus health/metrics.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/execute", post(execute))
        .route("/sessions/{id}/cancel", post(cancel))
        .route("/quote", get(get_quote))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Push-channel port router: just `/ws`, served separately per §6.5's
/// distinct `push_channel_port` so a slow subscriber fan-out never
/// contends with the request/response API's listener.
pub fn push_channel_router(state: AppState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}
