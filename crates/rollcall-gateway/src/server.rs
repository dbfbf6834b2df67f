use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::delivery::Delivery;
use crate::middleware::{authenticate, AuthQuery};
use crate::protocol::{Connected, OutboundEvent};
use crate::router::{EventDispatcher, MessageRouter};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use rollcall_core::{IdentityVerifier, Principal, Role, RollcallError, RollcallResult};
use rollcall_session::{AttendanceStore, SessionHandle};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    /// Dispatcher plus delivery for WebSocket frames.
    pub router: Arc<MessageRouter>,
    /// Credential check used at handshake and by the start trigger.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Class ownership and roster lookups.
    pub store: Arc<dyn AttendanceStore>,
    /// The live session actor.
    pub session: SessionHandle,
}

/// The HTTP + WebSocket front door.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway with a freshly spawned session actor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(verifier: Arc<dyn IdentityVerifier>, store: Arc<dyn AttendanceStore>) -> Router {
        Self::build_with_session(verifier, store, SessionHandle::spawn())
    }

    /// Build the gateway around an existing session actor.
    pub fn build_with_session(
        verifier: Arc<dyn IdentityVerifier>,
        store: Arc<dyn AttendanceStore>,
        session: SessionHandle,
    ) -> Router {
        let registry = ConnectionRegistry::new();
        let dispatcher = EventDispatcher::new(session.clone(), store.clone());
        let router = Arc::new(MessageRouter::new(dispatcher, Delivery::new(registry)));

        let state = Arc::new(AppState {
            router,
            verifier,
            store,
            session,
        });

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/session", get(session_status_handler).post(start_session_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "rollcall"}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionRequest {
    class_id: String,
}

/// The start trigger: a verified teacher opens a session for a class they own.
async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
    Json(body): Json<StartSessionRequest>,
) -> impl IntoResponse {
    match start_session(&state, &headers, &query, body).await {
        Ok(ack) => (StatusCode::OK, Json(ack)),
        Err(e) => error_response(e),
    }
}

async fn start_session(
    state: &AppState,
    headers: &HeaderMap,
    query: &AuthQuery,
    body: StartSessionRequest,
) -> Result<serde_json::Value, (StatusCode, RollcallError)> {
    let principal = authenticate(state.verifier.as_ref(), headers, query)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e))?;
    if principal.role != Role::Teacher {
        return Err((
            StatusCode::FORBIDDEN,
            RollcallError::Authorization("only a teacher can start a session".into()),
        ));
    }

    let owner = state
        .store
        .class_owner(&body.class_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    match owner {
        None => {
            return Err((
                StatusCode::NOT_FOUND,
                RollcallError::UnknownClass(body.class_id),
            ))
        }
        Some(owner) if owner != principal.id => {
            return Err((
                StatusCode::FORBIDDEN,
                RollcallError::Authorization(format!(
                    "class '{}' is not owned by {}",
                    body.class_id, principal.id
                )),
            ))
        }
        Some(_) => {}
    }

    let (class_id, started_at) = state.session.start(body.class_id).await.map_err(|e| {
        let status = if e.is_session_state() {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, e)
    })?;
    info!(teacher_id = %principal.id, class_id = %class_id, "Session start accepted");
    Ok(serde_json::json!({ "classId": class_id, "startedAt": started_at }))
}

async fn session_status_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.session.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => error_response((StatusCode::INTERNAL_SERVER_ERROR, e)).into_response(),
    }
}

fn error_response((status, e): (StatusCode, RollcallError)) -> (StatusCode, Json<serde_json::Value>) {
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    } else {
        warn!(status = %status, error = %e, "Request rejected");
    }
    (status, Json(serde_json::json!({ "message": e.to_string() })))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AuthQuery>,
) -> impl IntoResponse {
    let verified = authenticate(state.verifier.as_ref(), &headers, &query);
    ws.on_upgrade(move |socket| async move {
        match verified {
            Ok(principal) => handle_socket(socket, state, principal).await,
            Err(e) => reject_socket(socket, e).await,
        }
    })
}

/// Send one error frame and close. The socket is never registered.
async fn reject_socket(mut socket: WebSocket, e: RollcallError) {
    warn!(error = %e, "WebSocket handshake rejected");
    if let Ok(json) = OutboundEvent::error(e.to_string()).to_json() {
        let _ = socket.send(Message::Text(json.into())).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, principal: Principal) {
    let connection_id = Uuid::new_v4();

    let delivery = state.router.delivery();
    let Some(mut rx) = open_outbox(delivery.registry(), connection_id, &principal).await else {
        error!(connection_id = %connection_id, "Connection id already registered; closing socket");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    info!(
        connection_id = %connection_id,
        principal_id = %principal.id,
        role = %principal.role,
        "WebSocket connected"
    );

    let welcome = OutboundEvent::Connected(Connected {
        connection_id: connection_id.to_string(),
        id: principal.id.clone(),
        role: principal.role,
    });
    delivery.unicast(connection_id, &welcome).await;

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task: forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Task: receive frames and route them one at a time. Dropping this
    // handle does not cancel an in-flight finalize.
    let router = state.router.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = router.handle_message(text.as_str(), connection_id).await {
                        error!(error = %e, "Failed to handle message");
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    delivery.registry().unregister(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

/// Register `id` and return the receiving end of its outbox, or `None` if
/// the id is already taken. A `None` connection must not be served.
async fn open_outbox(
    registry: &ConnectionRegistry,
    id: ConnectionId,
    principal: &Principal,
) -> Option<mpsc::UnboundedReceiver<String>> {
    // Channel for sending messages back to the WebSocket
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    registry
        .register(id, principal.clone(), tx)
        .await
        .then_some(rx)
}

/// Bind and serve until the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> RollcallResult<()> {
    axum::serve(listener, app).await?;
    Ok(())
}
