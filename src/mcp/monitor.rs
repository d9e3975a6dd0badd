/// Monitoring feed pushed to SSE subscribers
///
/// Delivery is best effort: a subscriber that falls behind the broadcast buffer
/// silently misses the lagged events, and nothing here ever waits on a slow
/// reader. Closing the monitor ends every open stream so a graceful shutdown
/// does not wait on idle subscribers.

use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Local;
use futures::Stream;
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::domain::ResultEnvelope;

/// Events buffered per subscriber before older ones are dropped
const MONITOR_CAPACITY: usize = 256;

/// One entry in the monitoring feed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Mirror of an inbound JSON-RPC request; no method when the body was not a request
    Request {
        method: Option<String>,
        id: Value,
        timestamp: String,
    },
    /// Outcome of an answered request
    Response {
        method: String,
        id: Value,
        is_error: bool,
        timestamp: String,
    },
    /// Result of a command issued by the interactive control surface
    UiResult {
        #[serde(flatten)]
        envelope: ResultEnvelope,
        received_at: String,
    },
}

impl MonitorEvent {
    pub fn request(method: &str, id: &Value) -> Self {
        MonitorEvent::Request {
            method: Some(method.to_string()),
            id: id.clone(),
            timestamp: now(),
        }
    }

    /// A body that was rejected before a method could be read from it
    pub fn unparsed(id: &Value) -> Self {
        MonitorEvent::Request {
            method: None,
            id: id.clone(),
            timestamp: now(),
        }
    }

    pub fn response(method: &str, id: &Value, is_error: bool) -> Self {
        MonitorEvent::Response {
            method: method.to_string(),
            id: id.clone(),
            is_error,
            timestamp: now(),
        }
    }

    pub fn ui_result(envelope: ResultEnvelope) -> Self {
        MonitorEvent::UiResult {
            envelope,
            received_at: now(),
        }
    }
}

fn now() -> String {
    Local::now().to_rfc3339()
}

/// Fan-out handle for the monitoring feed
#[derive(Debug, Clone)]
pub struct Monitor {
    tx: broadcast::Sender<MonitorEvent>,
    closed: Arc<watch::Sender<bool>>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(MONITOR_CAPACITY);
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            closed: Arc::new(closed),
        }
    }

    /// Push an event to every current subscriber
    pub fn publish(&self, event: MonitorEvent) {
        // An error only means nobody is listening
        if self.tx.send(event).is_err() {
            debug!("Monitor event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// End every open stream; streams opened afterwards end at once
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// SSE response: a `connected` event, then one `data:` event per feed entry
    pub fn sse(
        &self,
        keepalive: Duration,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        Sse::new(self.events()).keep_alive(KeepAlive::new().interval(keepalive).text("keepalive"))
    }

    /// The events behind [`Monitor::sse`], ending when the monitor is closed
    pub fn events(&self) -> impl Stream<Item = Result<Event, Infallible>> {
        let connected = Event::default()
            .event("connected")
            .data(json!({"connected": true, "protocol": "http"}).to_string());

        let feed = BroadcastStream::new(self.subscribe()).filter_map(|item| match item {
            Ok(event) => match Event::default().json_data(&event) {
                Ok(sse_event) => Some(Ok::<_, Infallible>(sse_event)),
                Err(e) => {
                    warn!("Failed to encode monitor event: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(count)) => {
                warn!(skipped = count, "SSE subscriber lagged behind");
                None
            }
        });

        let mut closed = self.closed.subscribe();
        let shutdown = async move {
            let _ = closed.wait_for(|closed| *closed).await;
        };

        let stream = tokio_stream::once(Ok::<_, Infallible>(connected)).chain(feed);
        futures::StreamExt::take_until(stream, shutdown)
    }
}
