//! Event Bus - load notifications from the live document
//!
//! Design: Type-safe events, one broadcast channel.
//! Whoever drives the document publishes; every pending watcher subscribes.

use dom::NodeId;
use serde::{Deserialize, Serialize};
use snapshot::{Id, SerializedNode};
use tokio::sync::broadcast;

/// Load events the recorder waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomEvent {
    /// `load` fired on an iframe element
    IframeLoaded(NodeId),
    /// `load` fired on a `<link rel=stylesheet>`
    StylesheetLoaded(NodeId),
    /// `load` fired on an `<img>`
    ImageLoaded(NodeId),
}

/// Results of deferred work, delivered after the full snapshot returned
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SnapshotEvent {
    /// The iframe's document, serialized once it loaded or timed out
    #[serde(rename_all = "camelCase")]
    IframeLoaded { iframe: NodeId, document: SerializedNode },
    /// A stylesheet link that was left out while its sheet was loading
    #[serde(rename_all = "camelCase")]
    StylesheetLoaded { link: NodeId, node: SerializedNode },
    /// Data URL for an image that had not loaded at snapshot time
    #[serde(rename_all = "camelCase")]
    ImageInlined { image: NodeId, id: Id, data_url: String },
}

/// Simple event bus using tokio broadcast channel
pub struct EventBus {
    tx: broadcast::Sender<DomEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: DomEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DomEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers (pending watchers)
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(DomEvent::IframeLoaded(7));

        match rx.recv().await {
            Ok(DomEvent::IframeLoaded(7)) => {}
            other => panic!("Expected IframeLoaded(7), got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_event_wire_shape() {
        let event = SnapshotEvent::ImageInlined {
            image: 3,
            id: 5,
            data_url: "data:,".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({ "type": "imageInlined", "image": 3, "id": 5, "dataUrl": "data:," })
        );
    }
}
