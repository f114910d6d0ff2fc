//! WebSocket handler — presence frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, mints a connection ID, binds to the handshake's document if
//! one was given, and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Frames fanned out by document peers → forward to client
//!
//! Handlers return an `Outcome` for the sender only. Fan-out to peers goes
//! through the registry, never through the sender's socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `connection_id` (and color if bound)
//! 2. Client sends `pointer:move` / `session:join` frames
//! 3. Close or transport error → binding closed → `session:part` to peers

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, GATEWAY_ERROR, POINTER_MOVE, SESSION_CONNECTED, Status};
use crate::services;
use crate::services::binding::SessionBinding;
use crate::state::AppState;

const DEFAULT_NAME: &str = "anonymous";

// =============================================================================
// OUTCOME
// =============================================================================

/// What the dispatch layer sends back to the originating client.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Nothing goes back to the sender. Used for pointer moves.
    Silent,
}

// =============================================================================
// UPGRADE
// =============================================================================

/// Identity and optional document supplied in the upgrade query string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Handshake {
    user_id: String,
    name: String,
    document_id: Option<String>,
}

impl Handshake {
    fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        let non_blank = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        let user_id = non_blank("user_id")?;
        let name = non_blank("name").unwrap_or_else(|| DEFAULT_NAME.to_owned());
        Some(Self { user_id, name, document_id: non_blank("document_id") })
    }
}

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(handshake) = Handshake::from_params(&params) else {
        return (StatusCode::BAD_REQUEST, "user_id required").into_response();
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, handshake))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, handshake: Handshake) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for frames fanned out by document peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.outbound_buffer);
    let mut binding = SessionBinding::new(connection_id, handshake.user_id.clone(), handshake.name, client_tx);

    let mut welcome = Frame::request(SESSION_CONNECTED, Data::new())
        .with_data("connection_id", connection_id.to_string())
        .with_data("user_id", handshake.user_id.clone());
    let mut bind_error = None;

    if let Some(document_id) = handshake.document_id {
        match binding.bind(&state, &document_id).await {
            Ok(member) => {
                welcome = welcome
                    .with_document_id(member.document_id.clone())
                    .with_data("document_id", member.document_id)
                    .with_data("color", member.color);
            }
            Err(e) => bind_error = Some(welcome.error_from(&e)),
        }
    }

    info!(%connection_id, user_id = %handshake.user_id, document_id = ?binding.document_id(), "ws: client connected");

    let greeting = std::iter::once(welcome).chain(bind_error);
    for frame in greeting {
        if send_frame(&mut socket, &frame).await.is_err() {
            binding.close(&state).await;
            return;
        }
    }

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, &mut binding, text.as_str()).await;
                        for frame in replies {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    binding.close(&state).await;
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket loop so tests can drive dispatch with plain
/// channels.
async fn process_inbound_text(state: &AppState, binding: &mut SessionBinding, text: &str) -> Vec<Frame> {
    let connection_id = binding.connection_id();
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request(GATEWAY_ERROR, Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    if req.syscall != POINTER_MOVE {
        debug!(%connection_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    }

    let result = match req.prefix() {
        "pointer" => handle_pointer(state, binding, &req).await,
        "session" => handle_session(state, binding, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Silent) => vec![],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// POINTER HANDLER
// =============================================================================

async fn handle_pointer(state: &AppState, binding: &SessionBinding, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "move" => {
            let (Some(x), Some(y)) = (req.data_f64("x"), req.data_f64("y")) else {
                return Err(req.error("x and y required"));
            };
            if !x.is_finite() || !y.is_finite() {
                return Err(req.error("x and y must be finite"));
            }

            // Moves before the connection is bound are dropped inside the service.
            services::presence::on_pointer_move(state, binding.connection_id(), x, y).await;
            Ok(Outcome::Silent)
        }
        op => Err(req.error(format!("unknown pointer op: {op}"))),
    }
}

// =============================================================================
// SESSION HANDLER
// =============================================================================

async fn handle_session(state: &AppState, binding: &mut SessionBinding, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let Some(document_id) = req
                .document_id
                .as_deref()
                .or_else(|| req.data_str("document_id"))
            else {
                return Err(req.error("document_id required"));
            };

            match binding.bind(state, document_id).await {
                Ok(member) => {
                    let mut reply = Data::new();
                    reply.insert("connection_id".into(), serde_json::json!(member.connection_id));
                    reply.insert("document_id".into(), serde_json::json!(member.document_id));
                    reply.insert("color".into(), serde_json::json!(member.color));
                    Ok(Outcome::Reply(reply))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown session op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data_str("code").unwrap_or("-");
        let message = frame.data_str("message").unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
