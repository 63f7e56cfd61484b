// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Response Correlation Manager - request/reply over the event stream
//!
//! Maps an event id to a one-shot slot. The front door registers before it
//! publishes, then waits on the returned [`PendingResponse`]; a worker's
//! `DeliverResponse` call completes it. Lookup-and-remove happens under one
//! lock, so at most one delivery per id ever succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::event::EventId;
use crate::domain::response::WorkflowResponse;

/// Extra time an entry may outlive its timeout before the sweeper drops it.
pub const SWEEP_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("no pending request for event: {0}")]
    NoPendingRequest(EventId),

    #[error("response receiver gone for event: {0}")]
    ReceiverDropped(EventId),
}

/// Why a wait ended without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    #[error("timed out waiting for workflow response")]
    TimedOut,

    /// The slot was swept or replaced before a response arrived
    #[error("pending response was abandoned")]
    Abandoned,
}

struct PendingEntry {
    ticket: u64,
    tx: oneshot::Sender<WorkflowResponse>,
    created_at: Instant,
    timeout: Duration,
}

pub struct ResponseCorrelationManager {
    pending: Mutex<HashMap<EventId, PendingEntry>>,
    next_ticket: AtomicU64,
}

impl ResponseCorrelationManager {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Register a slot for `event_id`. Must happen before the event is
    /// published. Dropping the returned handle unregisters the slot.
    pub fn register(self: &Arc<Self>, event_id: EventId, timeout: Duration) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let replaced = self.pending.lock().insert(
            event_id.clone(),
            PendingEntry {
                ticket,
                tx,
                created_at: Instant::now(),
                timeout,
            },
        );
        if replaced.is_some() {
            warn!(event_id = %event_id, "Replaced existing pending response");
        }
        debug!(event_id = %event_id, timeout_ms = timeout.as_millis() as u64, "Pending response registered");

        PendingResponse {
            event_id,
            ticket,
            timeout,
            receiver: rx,
            manager: Arc::downgrade(self),
        }
    }

    /// Hand a response to the waiter for `event_id`.
    ///
    /// Unknown, expired and already-answered ids fail with
    /// `NoPendingRequest`; that is an expected outcome for late deliveries.
    pub fn deliver(&self, event_id: &EventId, response: WorkflowResponse) -> Result<(), CorrelationError> {
        let entry = self.pending.lock().remove(event_id);

        let Some(entry) = entry else {
            metrics::counter!("flowgate_correlation_misses_total").increment(1);
            debug!(event_id = %event_id, "No pending request for delivered response");
            return Err(CorrelationError::NoPendingRequest(event_id.clone()));
        };

        entry.tx.send(response).map_err(|_| {
            warn!(event_id = %event_id, "Waiter left before response was delivered");
            CorrelationError::ReceiverDropped(event_id.clone())
        })?;

        info!(
            event_id = %event_id,
            waited_ms = entry.created_at.elapsed().as_millis() as u64,
            "Workflow response delivered"
        );
        Ok(())
    }

    /// Remove the slot for `event_id`, if any.
    pub fn unregister(&self, event_id: &EventId) -> bool {
        self.pending.lock().remove(event_id).is_some()
    }

    fn release(&self, event_id: &EventId, ticket: u64) {
        let mut pending = self.pending.lock();
        if pending.get(event_id).map(|e| e.ticket) == Some(ticket) {
            pending.remove(event_id);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop entries that outlived their timeout by more than [`SWEEP_SLACK`].
    pub fn sweep_expired(&self) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, entry| entry.created_at.elapsed() <= entry.timeout + SWEEP_SLACK);
        before - pending.len()
    }

    /// Run [`Self::sweep_expired`] every `interval` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        let swept = manager.sweep_expired();
                        if swept > 0 {
                            warn!(swept, "Swept expired pending responses");
                        }
                    }
                }
            }
            debug!("Pending response sweeper stopped");
        })
    }
}

impl Default for ResponseCorrelationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive side of a registered slot.
pub struct PendingResponse {
    event_id: EventId,
    ticket: u64,
    timeout: Duration,
    receiver: oneshot::Receiver<WorkflowResponse>,
    manager: Weak<ResponseCorrelationManager>,
}

impl PendingResponse {
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait up to the registered timeout. The slot is released on return.
    pub async fn wait(mut self) -> Result<WorkflowResponse, WaitError> {
        match tokio::time::timeout(self.timeout, &mut self.receiver).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(WaitError::Abandoned),
            Err(_) => Err(WaitError::TimedOut),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.release(&self.event_id, self.ticket);
        }
    }
}
