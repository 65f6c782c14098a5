// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lifecycle events raised by cleanup.
//!
//! Cleanup only buffers events. The reconciler hands them to an
//! [`EventSink`] after the round's unit of work has committed, so a
//! rolled-back round never announces a transition that did not happen.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::RowId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventSinkError {
    #[error("event sink closed")]
    Closed,
    #[error("event sink error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    ModuleState,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleState => "moduleState",
        }
    }
}

/// `Start` opens an alert (module went down), `End` closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub source: String,
    pub target: String,
    pub kind: EventKind,
    pub netbox: RowId,
    pub device: Option<RowId>,
    /// The row the event is about.
    pub subject: RowId,
    pub state: EventState,
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} netbox={} subject={} ({} -> {})",
            self.kind.as_str(),
            self.state,
            self.netbox,
            self.subject,
            self.source,
            self.target
        )
    }
}

/// Destination for committed lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event) -> Result<(), EventSinkError>;
}

/// Sink that keeps every event. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn emit(&self, event: Event) -> Result<(), EventSinkError> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Sink forwarding into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelEventSink {
    /// Create a sink and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: Event) -> Result<(), EventSinkError> {
        self.tx.send(event).map_err(|_| EventSinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_down() -> Event {
        Event {
            source: "getDeviceData".into(),
            target: "eventEngine".into(),
            kind: EventKind::ModuleState,
            netbox: RowId::Serial(1),
            device: Some(RowId::Serial(9)),
            subject: RowId::Serial(4),
            state: EventState::Start,
        }
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemoryEventSink::new();
        sink.emit(module_down()).await.unwrap();

        assert_eq!(sink.events(), vec![module_down()]);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelEventSink::channel();
        sink.emit(module_down()).await.unwrap();

        assert_eq!(rx.recv().await, Some(module_down()));
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelEventSink::channel();
        drop(rx);

        assert_eq!(sink.emit(module_down()).await, Err(EventSinkError::Closed));
    }

    #[test]
    fn test_event_serializes() {
        let json = serde_json::to_value(module_down()).unwrap();
        assert_eq!(json["kind"], "moduleState");
        assert_eq!(json["state"], "start");
    }
}
