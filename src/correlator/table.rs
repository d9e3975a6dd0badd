/// The pending-request table owned by the correlator task
///
/// All bookkeeping is synchronous and lives here; the actor in `mod.rs` only
/// feeds messages into it. Every terminal transition (matched, timed out,
/// cancelled, swept) removes the entry from both the map and the FIFO order, so a
/// late result for a finished request finds nothing and is reported unmatched.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::correlator::matching::fits_tool;
use crate::correlator::CorrelatorError;
use crate::domain::{RequestId, ResultEnvelope, ToolName};

/// What a waiter eventually receives
pub type Outcome = Result<ResultEnvelope, CorrelatorError>;

/// Lifecycle of a tracked request before it reaches a terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Registered, command not yet handed to the channel
    Created,
    /// Command broadcast, awaiting a result
    Sent,
}

/// One outstanding command awaiting its result
#[derive(Debug)]
pub struct PendingRequest {
    pub id: RequestId,
    pub tool: ToolName,
    pub created_at: Instant,
    pub state: RequestState,
    slot: oneshot::Sender<Outcome>,
}

impl PendingRequest {
    fn settle(self, outcome: Outcome) {
        if self.slot.send(outcome).is_err() {
            debug!(request_id = %self.id, "Waiter already gone, outcome dropped");
        }
    }
}

/// How an inbound result was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Bound by its echoed request id
    Direct(RequestId),
    /// Bound to the oldest pending request through the shape check
    Fifo(RequestId),
    /// Logged and dropped
    Unmatched,
}

/// Map of pending requests plus their insertion order
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<RequestId, PendingRequest>,
    order: VecDeque<RequestId>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.contains_key(id)
    }

    /// Start tracking `id`, returning the receiving half of its result slot
    pub fn register(
        &mut self,
        id: RequestId,
        tool: ToolName,
    ) -> Result<oneshot::Receiver<Outcome>, CorrelatorError> {
        if self.entries.contains_key(&id) {
            return Err(CorrelatorError::DuplicateId(id));
        }

        let (slot, waiter) = oneshot::channel();
        self.order.push_back(id.clone());
        self.entries.insert(
            id.clone(),
            PendingRequest {
                id,
                tool,
                created_at: Instant::now(),
                state: RequestState::Created,
                slot,
            },
        );
        Ok(waiter)
    }

    /// Record that the command for `id` left through the channel
    pub fn mark_sent(&mut self, id: &RequestId) {
        if let Some(pending) = self.entries.get_mut(id) {
            pending.state = RequestState::Sent;
        }
    }

    /// Bind an inbound result to at most one pending request
    pub fn resolve(&mut self, envelope: ResultEnvelope) -> Resolution {
        if let Some(id) = envelope.request_id() {
            return match self.take(&id) {
                Some(pending) => {
                    debug!(request_id = %id.short(), tool = %pending.tool, "Matched result by id");
                    pending.settle(Ok(envelope));
                    Resolution::Direct(id)
                }
                None => {
                    warn!(request_id = %id, pending = self.len(), "Unmatched result, id is not pending");
                    Resolution::Unmatched
                }
            };
        }

        let oldest = self
            .order
            .iter()
            .find(|id| {
                self.entries
                    .get(*id)
                    .map(|pending| pending.state == RequestState::Sent)
                    .unwrap_or(false)
            })
            .cloned();

        if let Some(id) = oldest {
            let fits = self
                .entries
                .get(&id)
                .map(|pending| fits_tool(pending.tool, &envelope))
                .unwrap_or(false);

            if fits {
                if let Some(pending) = self.take(&id) {
                    warn!(request_id = %id.short(), tool = %pending.tool, "Result without id matched by FIFO fallback");
                    pending.settle(Ok(envelope));
                    return Resolution::Fifo(id);
                }
            }
        }

        warn!(pending = self.len(), "Unmatched result without id dropped");
        Resolution::Unmatched
    }

    /// Time out `id`; returns false if it was no longer pending
    pub fn expire(&mut self, id: &RequestId) -> bool {
        match self.take(id) {
            Some(pending) => {
                let elapsed = pending.created_at.elapsed();
                debug!(request_id = %id.short(), tool = %pending.tool, ?elapsed, "Request expired");
                pending.settle(Err(CorrelatorError::Timeout { elapsed }));
                true
            }
            None => false,
        }
    }

    /// Abandon `id` because its caller went away or its command was never sent
    pub fn cancel(&mut self, id: &RequestId) -> bool {
        match self.take(id) {
            Some(pending) => {
                debug!(request_id = %id.short(), tool = %pending.tool, "Request cancelled");
                pending.settle(Err(CorrelatorError::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Drop every entry older than `max_age`, returning how many were removed
    pub fn sweep(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<RequestId> = self
            .entries
            .values()
            .filter(|pending| now.duration_since(pending.created_at) > max_age)
            .map(|pending| pending.id.clone())
            .collect();

        for id in &stale {
            if let Some(pending) = self.take(id) {
                let age = now.duration_since(pending.created_at);
                warn!(request_id = %id, tool = %pending.tool, ?age, "Swept stale pending request");
                pending.settle(Err(CorrelatorError::Stale { age }));
            }
        }
        stale.len()
    }

    /// Settle everything as cancelled, used when the correlator shuts down
    pub fn drain(&mut self) {
        self.order.clear();
        for (_, pending) in self.entries.drain() {
            pending.settle(Err(CorrelatorError::Closed));
        }
    }

    fn take(&mut self, id: &RequestId) -> Option<PendingRequest> {
        let pending = self.entries.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(pending)
    }
}
