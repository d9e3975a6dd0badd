/// Command channel to the browser extension
///
/// The channel keeps a pool of connected extension clients, broadcasts commands
/// to all of them and hands every inbound result to a single registered handler.
/// It keeps no per-request state: which caller a result belongs to is decided by
/// the handler (see `routing`), never here.

pub mod messages;
pub mod socket;

pub use messages::{InboundFrame, OutboundFrame};
pub use socket::router;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::domain::{Command, ResultEnvelope};

/// Identifier of one connected extension instance
pub type ConnectionId = u64;

/// Receives every `dom_operation_result` from any client
#[async_trait]
pub trait ResultHandler: Send + Sync {
    async fn handle_result(&self, envelope: ResultEnvelope);
}

/// One open endpoint in the pool
///
/// The socket task drains `outbound` into the wire; when it stops doing so the
/// next broadcast fails for this client and prunes it.
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ConnectionId,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

struct ChannelInner {
    clients: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    handler: RwLock<Option<Arc<dyn ResultHandler>>>,
    next_id: AtomicU64,
}

/// Shared handle to the connection pool
#[derive(Clone)]
pub struct CommandChannel {
    inner: Arc<ChannelInner>,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                clients: RwLock::new(HashMap::new()),
                handler: RwLock::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register the callback for inbound results, replacing any previous one
    pub async fn on_result(&self, handler: Arc<dyn ResultHandler>) {
        *self.inner.handler.write().await = Some(handler);
    }

    /// Add a client to the pool
    pub async fn connect(&self) -> ClientConnection {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, outbound) = mpsc::unbounded_channel();
        let mut clients = self.inner.clients.write().await;
        clients.insert(id, tx);
        info!(client = id, total = clients.len(), "Extension client connected");
        ClientConnection { id, outbound }
    }

    /// Remove a client from the pool
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut clients = self.inner.clients.write().await;
        if clients.remove(&id).is_some() {
            info!(client = id, total = clients.len(), "Extension client disconnected");
        }
    }

    pub async fn client_count(&self) -> usize {
        self.inner.clients.read().await.len()
    }

    /// Send a command to every connected client
    ///
    /// Returns whether at least one client accepted it. Clients whose send fails
    /// are pruned; one failing client never prevents delivery to the others.
    pub async fn broadcast(&self, command: &Command) -> bool {
        self.broadcast_frame(&OutboundFrame::DomOperation(command.clone())).await
    }

    pub async fn broadcast_frame(&self, frame: &OutboundFrame) -> bool {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound frame");
                return false;
            }
        };

        let mut delivered = 0usize;
        let mut failed = Vec::new();
        {
            let clients = self.inner.clients.read().await;
            if clients.is_empty() {
                return false;
            }
            for (id, tx) in clients.iter() {
                if tx.send(text.clone()).is_ok() {
                    delivered += 1;
                } else {
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            let mut clients = self.inner.clients.write().await;
            for id in &failed {
                clients.remove(id);
                warn!(client = id, "Pruned extension client after failed send");
            }
        }

        debug!(delivered, pruned = failed.len(), "Broadcast frame");
        delivered > 0
    }

    /// Send a frame to one client
    pub async fn send_to(&self, id: ConnectionId, frame: &OutboundFrame) -> bool {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound frame");
                return false;
            }
        };
        let sent = match self.inner.clients.read().await.get(&id) {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        };
        if !sent {
            self.disconnect(id).await;
        }
        sent
    }

    /// Process one text frame received from client `id`
    pub async fn handle_inbound(&self, id: ConnectionId, text: &str) {
        let (kind, frame) = match messages::parse_inbound(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(client = id, error = %e, "Invalid frame from extension");
                self.send_to(id, &OutboundFrame::error(format!("Invalid message: {}", e)))
                    .await;
                return;
            }
        };

        debug!(client = id, kind = %kind, "Received frame");

        match frame {
            InboundFrame::DomOperationResult(envelope) => {
                let handler = self.inner.handler.read().await.clone();
                match handler {
                    Some(handler) => handler.handle_result(envelope).await,
                    None => warn!(client = id, "No result handler registered, result dropped"),
                }
            }
            InboundFrame::Heartbeat => {
                self.send_to(id, &OutboundFrame::heartbeat_response()).await;
            }
            InboundFrame::StatusRequest => {
                let connected = self.client_count().await;
                self.send_to(id, &OutboundFrame::status(connected)).await;
            }
            InboundFrame::TabUpdated { url } | InboundFrame::TabActivated { url } => {
                info!(client = id, event = %kind, url = url.as_deref().unwrap_or("unknown"), "Tab event");
            }
            InboundFrame::Unknown => {}
        }

        self.send_to(id, &OutboundFrame::ack(kind)).await;
    }
}
