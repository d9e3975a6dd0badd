/// WebSocket endpoint the browser extension connects to
///
/// Each connection gets a writer task draining its pool queue into the socket,
/// while the reader loop relays inbound text frames to the channel.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::channel::{CommandChannel, OutboundFrame};

/// Routes for the extension-facing socket server
pub fn router(channel: CommandChannel) -> Router {
    Router::new()
        .route("/", get(handle_upgrade))
        .route("/ws", get(handle_upgrade))
        .with_state(channel)
}

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(channel): State<CommandChannel>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, channel))
}

async fn handle_connection(socket: WebSocket, channel: CommandChannel) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection = channel.connect().await;
    let id = connection.id;
    let mut outbound = connection.outbound;

    let send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_sender.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    });

    channel.send_to(id, &OutboundFrame::welcome()).await;

    while let Some(msg) = ws_receiver.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                warn!(client = id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            WsMessage::Text(text) => channel.handle_inbound(id, &text).await,
            WsMessage::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => channel.handle_inbound(id, &text).await,
                Err(_) => debug!(client = id, "Ignoring non-UTF-8 binary frame"),
            },
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    channel.disconnect(id).await;
    send_task.abort();
}
