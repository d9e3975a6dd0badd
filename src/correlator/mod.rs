/// Request correlator matching outstanding commands to late-arriving results
///
/// The pending table is owned by a single task. The protocol side registers and
/// awaits, the channel side resolves, and both only talk to the task through
/// messages, so exactly one place ever decides which waiter a result belongs to.
/// A periodic sweep inside the same task removes entries that outlived the
/// staleness threshold.

pub mod matching;
pub mod table;

pub use table::{Outcome, PendingRequest, PendingTable, RequestState, Resolution};

use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::{RequestId, ResultEnvelope, ToolName};

/// Errors a waiter or caller of the correlator can observe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    #[error("Request id {0} is already pending")]
    DuplicateId(RequestId),

    #[error("No result within {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("Pending request evicted after {age:?} without a result")]
    Stale { age: Duration },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Correlator is not running")]
    Closed,
}

/// Timing knobs for the correlator task
#[derive(Debug, Clone, Copy)]
pub struct CorrelatorConfig {
    /// How often the stale sweep runs
    pub sweep_interval: Duration,
    /// Entries older than this are swept
    pub stale_after: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
        }
    }
}

enum Message {
    Register {
        id: RequestId,
        tool: ToolName,
        reply: oneshot::Sender<Result<oneshot::Receiver<Outcome>, CorrelatorError>>,
    },
    MarkSent {
        id: RequestId,
    },
    Resolve {
        envelope: ResultEnvelope,
        reply: oneshot::Sender<Resolution>,
    },
    Expire {
        id: RequestId,
        reply: oneshot::Sender<bool>,
    },
    Cancel {
        id: RequestId,
    },
    Sweep {
        max_age: Duration,
        reply: oneshot::Sender<usize>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the correlator task
#[derive(Clone, Debug)]
pub struct Correlator {
    tx: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Message::Register { .. } => "Register",
            Message::MarkSent { .. } => "MarkSent",
            Message::Resolve { .. } => "Resolve",
            Message::Expire { .. } => "Expire",
            Message::Cancel { .. } => "Cancel",
            Message::Sweep { .. } => "Sweep",
            Message::Count { .. } => "Count",
        };
        f.write_str(name)
    }
}

impl Correlator {
    /// Spawn the correlator task on the current runtime
    ///
    /// The task stops once every handle (and every waiter) has been dropped.
    pub fn spawn(config: CorrelatorConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, config));
        Self { tx }
    }

    /// Track a new request and return the handle its caller waits on
    pub async fn register(&self, id: RequestId, tool: ToolName) -> Result<Waiter, CorrelatorError> {
        let (reply, response) = oneshot::channel();
        self.send(Message::Register { id: id.clone(), tool, reply })?;
        let rx = response.await.map_err(|_| CorrelatorError::Closed)??;

        Ok(Waiter {
            id,
            tool,
            created_at: Instant::now(),
            rx,
            correlator: self.clone(),
            settled: false,
        })
    }

    /// Mark a registered request as sent through the channel
    pub fn mark_sent(&self, id: &RequestId) {
        let _ = self.send(Message::MarkSent { id: id.clone() });
    }

    /// Offer an inbound result to the pending requests
    pub async fn resolve(&self, envelope: ResultEnvelope) -> Resolution {
        let (reply, response) = oneshot::channel();
        if self.send(Message::Resolve { envelope, reply }).is_err() {
            return Resolution::Unmatched;
        }
        response.await.unwrap_or(Resolution::Unmatched)
    }

    /// Time out a request, releasing its waiter with a timeout error
    pub async fn expire(&self, id: &RequestId) -> bool {
        let (reply, response) = oneshot::channel();
        if self.send(Message::Expire { id: id.clone(), reply }).is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Abandon a request whose caller no longer needs it
    pub fn cancel(&self, id: &RequestId) {
        let _ = self.send(Message::Cancel { id: id.clone() });
    }

    /// Remove entries older than `max_age`
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let (reply, response) = oneshot::channel();
        if self.send(Message::Sweep { max_age, reply }).is_err() {
            return 0;
        }
        response.await.unwrap_or(0)
    }

    /// Number of requests currently awaiting a result
    pub async fn pending_count(&self) -> usize {
        let (reply, response) = oneshot::channel();
        if self.send(Message::Count { reply }).is_err() {
            return 0;
        }
        response.await.unwrap_or(0)
    }

    fn send(&self, message: Message) -> Result<(), CorrelatorError> {
        self.tx.send(message).map_err(|_| CorrelatorError::Closed)
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Message>, config: CorrelatorConfig) {
    let mut table = PendingTable::new();
    let mut sweep = tokio::time::interval_at(
        Instant::now() + config.sweep_interval,
        config.sweep_interval,
    );
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(stale_after = ?config.stale_after, "Correlator started");

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                handle(&mut table, message);
            }
            _ = sweep.tick() => {
                let removed = table.sweep(config.stale_after);
                if removed > 0 {
                    debug!(removed, remaining = table.len(), "Periodic sweep");
                }
            }
        }
    }

    table.drain();
    info!("Correlator stopped");
}

fn handle(table: &mut PendingTable, message: Message) {
    match message {
        Message::Register { id, tool, reply } => {
            let _ = reply.send(table.register(id, tool));
        }
        Message::MarkSent { id } => table.mark_sent(&id),
        Message::Resolve { envelope, reply } => {
            let _ = reply.send(table.resolve(envelope));
        }
        Message::Expire { id, reply } => {
            let _ = reply.send(table.expire(&id));
        }
        Message::Cancel { id } => {
            table.cancel(&id);
        }
        Message::Sweep { max_age, reply } => {
            let _ = reply.send(table.sweep(max_age));
        }
        Message::Count { reply } => {
            let _ = reply.send(table.len());
        }
    }
}

/// The caller's side of a pending request
///
/// Dropping a waiter before it settles cancels the request.
#[derive(Debug)]
pub struct Waiter {
    id: RequestId,
    tool: ToolName,
    created_at: Instant,
    rx: oneshot::Receiver<Outcome>,
    correlator: Correlator,
    settled: bool,
}

impl Waiter {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn tool(&self) -> ToolName {
        self.tool
    }

    /// Wait up to `timeout` for the matching result
    ///
    /// On timeout the request is expired through the correlator task, so a
    /// result racing the deadline either wins before the expiry or is reported
    /// unmatched afterwards; it can never be delivered twice.
    pub async fn wait(mut self, timeout: Duration) -> Outcome {
        let outcome = match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(CorrelatorError::Closed),
            Err(_) => {
                self.correlator.expire(&self.id).await;
                match (&mut self.rx).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(CorrelatorError::Timeout {
                        elapsed: self.created_at.elapsed(),
                    }),
                }
            }
        };
        self.settled = true;
        outcome
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if !self.settled {
            self.correlator.cancel(&self.id);
        }
    }
}
