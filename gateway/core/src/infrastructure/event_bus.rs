// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Manager - fan-out bus for trigger events
//
// One bounded inbound queue feeds a single broadcast task that copies each
// event (an Arc) into every registered subscriber queue. Delivery is
// at-most-once and best-effort:
// - publish waits at most `publish_grace` for inbound space, then rejects
// - each subscriber gets `delivery_grace` to make room, then misses the event
// - a slow subscriber never delays the others
//
// In-memory only; events are lost on restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::event::{EventId, TriggerEvent};
use crate::domain::node_config::EventBusSettings;

pub type SubscriberId = u64;

type SubscriberSet = Arc<Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<TriggerEvent>>>>>;

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    pub inbound_capacity: usize,
    /// Should be at least `inbound_capacity` so a burst fits in every queue
    pub subscriber_capacity: usize,
    pub publish_grace: Duration,
    pub delivery_grace: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 128,
            subscriber_capacity: 128,
            publish_grace: Duration::from_secs(3),
            delivery_grace: Duration::from_millis(100),
        }
    }
}

impl From<&EventBusSettings> for EventBusConfig {
    fn from(settings: &EventBusSettings) -> Self {
        Self {
            inbound_capacity: settings.inbound_capacity.max(1),
            subscriber_capacity: settings.subscriber_capacity.max(1),
            publish_grace: Duration::from_millis(settings.publish_grace_ms),
            delivery_grace: Duration::from_millis(settings.delivery_grace_ms),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("event channel blocked for event: {0}")]
    ChannelBlocked(EventId),

    #[error("Event bus is closed")]
    Closed,
}

/// Fan-out bus for trigger events.
pub struct EventManager {
    inbound: Mutex<Option<mpsc::Sender<Arc<TriggerEvent>>>>,
    subscribers: SubscriberSet,
    next_id: AtomicU64,
    config: EventBusConfig,
    broadcaster: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl EventManager {
    /// Create the bus and spawn its broadcast task. Requires a Tokio runtime.
    pub fn new(config: EventBusConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));
        let subscribers: SubscriberSet = Arc::new(Mutex::new(HashMap::new()));

        let handle = tokio::spawn(broadcast_loop(
            rx,
            subscribers.clone(),
            config.delivery_grace,
        ));

        Self {
            inbound: Mutex::new(Some(tx)),
            subscribers,
            next_id: AtomicU64::new(1),
            config,
            broadcaster: tokio::sync::Mutex::new(Some(handle)),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(EventBusConfig::default())
    }

    /// Queue an event for broadcast.
    ///
    /// Succeeds with zero subscribers. Fails with `ChannelBlocked` if the
    /// inbound queue stays full for the publish grace period; the event is
    /// dropped and the caller should reject its request.
    pub async fn publish(&self, event: TriggerEvent) -> Result<(), EventBusError> {
        let sender = self.inbound.lock().clone().ok_or(EventBusError::Closed)?;
        let event_id = event.event_id().clone();

        match sender.send_timeout(Arc::new(event), self.config.publish_grace).await {
            Ok(()) => {
                metrics::counter!("flowgate_events_published_total").increment(1);
                debug!(event_id = %event_id, "Event queued for broadcast");
                Ok(())
            }
            Err(SendTimeoutError::Timeout(_)) => {
                metrics::counter!("flowgate_events_rejected_total").increment(1);
                warn!(event_id = %event_id, "Event channel blocked, dropping event");
                Err(EventBusError::ChannelBlocked(event_id))
            }
            Err(SendTimeoutError::Closed(_)) => Err(EventBusError::Closed),
        }
    }

    /// Register a new subscriber queue.
    ///
    /// The subscriber receives every event broadcast after this call. Cleanup
    /// happens exactly once: on [`Subscription::close`] or on drop.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.subscriber_capacity.max(1));

        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::gauge!("flowgate_subscribers").set(count as f64);
        info!(subscriber = id, subscribers = count, "Subscriber registered");

        Subscription {
            id,
            receiver: rx,
            subscribers: self.subscribers.clone(),
            closed: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.lock().is_none()
    }

    /// Close the inbound queue and wait for the broadcast task to drain it.
    /// Subscriber queues close once their last event is consumed.
    pub async fn shutdown(&self) {
        // Dropping the sender lets the broadcast task finish after the backlog
        self.inbound.lock().take();

        if let Some(handle) = self.broadcaster.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Broadcast task ended abnormally");
            }
        }
        self.subscribers.lock().clear();
        info!("Event manager shut down");
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::with_default_config()
    }
}

async fn broadcast_loop(
    mut inbound: mpsc::Receiver<Arc<TriggerEvent>>,
    subscribers: SubscriberSet,
    delivery_grace: Duration,
) {
    while let Some(event) = inbound.recv().await {
        // Snapshot under the lock, send outside it
        let targets: Vec<(SubscriberId, mpsc::Sender<Arc<TriggerEvent>>)> = subscribers
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        if targets.is_empty() {
            debug!(event_id = %event.event_id(), "No subscribers listening to event");
            continue;
        }

        for (id, tx) in targets {
            match tx.send_timeout(event.clone(), delivery_grace).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    metrics::counter!("flowgate_subscriber_skips_total").increment(1);
                    warn!(
                        subscriber = id,
                        event_id = %event.event_id(),
                        "Subscriber queue full, skipping event"
                    );
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!(subscriber = id, "Subscriber closed during broadcast");
                }
            }
        }
    }
    debug!("Broadcast loop finished");
}

/// A registered subscriber's receive queue.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<TriggerEvent>>,
    subscribers: SubscriberSet,
    closed: bool,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the bus has shut down or this subscription
    /// was closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<TriggerEvent>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<TriggerEvent>> {
        self.receiver.try_recv().ok()
    }

    /// Remove this subscriber from the broadcast set and close its queue.
    /// Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let count = {
            let mut subscribers = self.subscribers.lock();
            subscribers.remove(&self.id);
            subscribers.len()
        };
        self.receiver.close();
        metrics::gauge!("flowgate_subscribers").set(count as f64);
        info!(subscriber = self.id, subscribers = count, "Subscriber removed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
