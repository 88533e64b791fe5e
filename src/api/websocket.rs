//! WebSocket viewer sessions
//!
//! One session per connected observer. The session registers itself with
//! the fan-out hub, relays the hub's events to its socket, and reads
//! inbound viewer messages (currently an inert text channel). Teardown is
//! triggered by transport close or error, or by the hub dropping the
//! session's buffer after a failed delivery.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tracing::{debug, info};

use crate::{
    api::state::ApiState,
    hub::{OutboundEvent, SessionHandle},
};

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_viewer(socket, state))
}

/// Drive one viewer session from connect to teardown.
async fn handle_viewer(socket: WebSocket, state: ApiState) {
    info!("viewer connected");

    let (mut sender, mut receiver) = socket.split();

    // one-time greeting, sent before the session joins the broadcast set
    if let Ok(text) = serde_json::to_string(&OutboundEvent::greeting())
        && sender.send(Message::Text(text)).await.is_err()
    {
        debug!("viewer went away before greeting");
        return;
    }

    let (session, mut events) = SessionHandle::channel(state.session_buffer);
    let session_id = session.id;
    state.hub.register(session).await;

    // Relay hub events to the socket. Ends when the socket breaks or when
    // the hub evicts this session and drops the channel.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };

            if sender.send(Message::Text(text)).await.is_err() {
                debug!("WebSocket send failed, viewer disconnected");
                break;
            }
        }
    });

    // Inbound viewer messages are currently inert
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Text(text) => {
                    debug!("viewer message: {text}");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.hub.unregister(session_id).await;

    info!("viewer disconnected");
}
