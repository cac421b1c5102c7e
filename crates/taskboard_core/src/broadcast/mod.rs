//! Fan-out of mutation results to connected observers.

use crate::error::AppError;
use crate::model::ResolvedTask;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum BoardEvent {
    #[serde(rename = "taskCreated")]
    TaskCreated(ResolvedTask),
    #[serde(rename = "taskUpdated")]
    TaskUpdated(ResolvedTask),
    /// Carries only the id; the record no longer exists.
    #[serde(rename = "taskDeleted")]
    TaskDeleted(String),
}

impl BoardEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "taskCreated",
            Self::TaskUpdated(_) => "taskUpdated",
            Self::TaskDeleted(_) => "taskDeleted",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::TaskCreated(task) | Self::TaskUpdated(task) => &task.id,
            Self::TaskDeleted(id) => id,
        }
    }
}

/// Delivery side of the board. Called only after the triggering write is
/// durable; failures are reported to the caller, never retried.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, event: &BoardEvent) -> Result<(), AppError>;
}

/// Single shared topic: every subscriber sees every event.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<Arc<BoardEvent>>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BoardEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, event: &BoardEvent) -> Result<(), AppError> {
        match self.sender.send(Arc::new(event.clone())) {
            Ok(receivers) => {
                debug!(event = event.name(), task = event.task_id(), receivers, "published");
            }
            // Nobody is listening; nothing to deliver.
            Err(_) => debug!(event = event.name(), task = event.task_id(), "no subscribers"),
        }
        Ok(())
    }
}

impl<B: Broadcaster + ?Sized> Broadcaster for Arc<B> {
    fn publish(&self, event: &BoardEvent) -> Result<(), AppError> {
        (**self).publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::{BoardEvent, Broadcaster, ChannelBroadcaster};

    #[test]
    fn every_subscriber_receives_each_event() {
        let broadcaster = ChannelBroadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster
            .publish(&BoardEvent::TaskDeleted("task-1".to_string()))
            .unwrap();

        assert_eq!(
            *first.try_recv().unwrap(),
            BoardEvent::TaskDeleted("task-1".to_string())
        );
        assert_eq!(second.try_recv().unwrap().name(), "taskDeleted");
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let broadcaster = ChannelBroadcaster::default();
        assert!(
            broadcaster
                .publish(&BoardEvent::TaskDeleted("task-1".to_string()))
                .is_ok()
        );
    }

    #[test]
    fn deleted_event_serializes_to_name_and_id() {
        let encoded =
            serde_json::to_value(BoardEvent::TaskDeleted("task-9".to_string())).unwrap();

        assert_eq!(
            encoded,
            serde_json::json!({ "event": "taskDeleted", "payload": "task-9" })
        );
    }
}
