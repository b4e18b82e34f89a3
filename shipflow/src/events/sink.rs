//! Destinations for run events.

use super::RunEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, Level};

/// Receives run lifecycle events.
///
/// Sinks cannot fail a run; problems are logged and dropped.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handles one event.
    async fn emit(&self, event: &RunEvent);
}

/// Discards every event. The default sink of a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: &RunEvent) {}
}

/// Writes events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`; anything but DEBUG logs at INFO.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: &RunEvent) {
        let event_type = event.event_type();
        let task = event.task();
        let stage = event.stage().map(|s| s.title());
        if self.level == Level::DEBUG {
            debug!(event_type, %task, ?stage, "Run event");
        } else {
            info!(event_type, %task, ?stage, "Run event");
        }
    }
}

/// Forwards events into an unbounded channel, e.g. for a UI task.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: &RunEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(event_type = event.event_type(), "Event receiver gone");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RunEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Event names in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(RunEvent::event_type).collect()
    }

    /// Events named `event_type`.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops everything collected so far.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: &RunEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageType;
    use crate::events::{STAGE_STARTED, TASK_STARTED};
    use uuid::Uuid;

    fn stage_started(stage: StageType) -> RunEvent {
        RunEvent::StageStarted {
            task: Uuid::nil(),
            stage,
        }
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        let event = stage_started(StageType::Upload);
        NoOpEventSink.emit(&event).await;
        LoggingEventSink::debug().emit(&event).await;
        LoggingEventSink::default().emit(&event).await;
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&RunEvent::TaskStarted {
            task: Uuid::nil(),
            name: "game".to_string(),
        })
        .await;
        sink.emit(&stage_started(StageType::GetSources)).await;
        sink.emit(&stage_started(StageType::Upload)).await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.event_types()[0], TASK_STARTED);
        let stages: Vec<_> = sink
            .events_of_type(STAGE_STARTED)
            .iter()
            .filter_map(RunEvent::stage)
            .collect();
        assert_eq!(stages, vec![StageType::GetSources, StageType::Upload]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_and_survives_closed_receiver() {
        let (sink, mut receiver) = ChannelEventSink::channel();
        sink.emit(&stage_started(StageType::Cleanup)).await;

        assert_eq!(receiver.recv().await, Some(stage_started(StageType::Cleanup)));

        drop(receiver);
        sink.emit(&stage_started(StageType::Cleanup)).await;
    }
}
