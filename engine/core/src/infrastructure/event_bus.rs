// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for Research Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Enables real-time progress streaming to CLI views, SSE bridges, and
// observers.
//
// In-memory only: events are lost on restart. Replay would need a
// persistent event store.

use crate::domain::events::ResearchEvent;
use crate::domain::task::TaskId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to research progress events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ResearchEvent>>,
}

impl EventBus {
    /// Capacity determines how many events can be buffered before old ones
    /// are dropped for slow subscribers.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ResearchEvent) {
        debug!("Publishing event: {:?}", event);
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all research events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe and filter for a specific task, useful for streaming the
    /// progress of a single research run
    pub fn subscribe_task(&self, task_id: TaskId) -> TaskEventReceiver {
        TaskEventReceiver {
            receiver: self.sender.subscribe(),
            task_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all research events
pub struct EventReceiver {
    receiver: broadcast::Receiver<ResearchEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocks until one is available)
    pub async fn recv(&mut self) -> Result<ResearchEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<ResearchEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to a single task's events
pub struct TaskEventReceiver {
    receiver: broadcast::Receiver<ResearchEvent>,
    task_id: TaskId,
}

impl TaskEventReceiver {
    /// Receive the next event for the subscribed task, skipping others
    pub async fn recv(&mut self) -> Result<ResearchEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            if event.task_id() == self.task_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{ProspectKey, TaskId};
    use crate::domain::template::ConsultantType;
    use chrono::Utc;

    fn key() -> ProspectKey {
        ProspectKey::new(ConsultantType::new("fractional-cmo").unwrap(), "acme")
    }

    fn queued(task_id: TaskId) -> ResearchEvent {
        ResearchEvent::TaskQueued {
            task_id,
            key: key(),
            priority: 5,
            queued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();
        let task_id = TaskId::new();

        bus.publish(queued(task_id));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.task_id(), task_id);
    }

    #[tokio::test]
    async fn task_subscription_filters_other_tasks() {
        let bus = EventBus::new(10);
        let ours = TaskId::new();
        let theirs = TaskId::new();
        let mut receiver = bus.subscribe_task(ours);

        bus.publish(queued(theirs));
        bus.publish(queued(ours));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.task_id(), ours);
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(queued(TaskId::new()));

        first.recv().await.unwrap();
        second.recv().await.unwrap();
    }
}
