//! ==============================================================================
//! events.rs - push channel for connected dashboards
//! ==============================================================================
//!
//! purpose:
//!     best-effort fan-out over a tokio broadcast channel. listeners that are
//!     not connected (or fall too far behind) simply miss events; there is
//!     no replay.
//!
//! relationships:
//!     - published by: api.rs (after ingest and threshold updates)
//!     - consumed by: api.rs (/ws forwards every event to its socket)
//!
//! ==============================================================================

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::{Reading, Thresholds};

/// Queue depth per listener before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Serialized as `{"event": "...", "data": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum DashboardEvent {
    #[serde(rename = "newData")]
    NewReading(Reading),
    #[serde(rename = "thresholds")]
    ThresholdsChanged(Thresholds),
}

#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<DashboardEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Returns the number of listeners the event was queued for.
    pub fn publish(&self, event: DashboardEvent) -> usize {
        // send only fails when nobody is listening
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_event_wire_shape() {
        let json = serde_json::to_value(DashboardEvent::ThresholdsChanged(Thresholds::default())).unwrap();
        assert_eq!(json["event"], "thresholds");
        assert_eq!(json["data"]["temperature_max"], 30.0);
        assert_eq!(json["data"]["light_min"], 500);
    }

    #[test]
    fn publish_without_listeners_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(DashboardEvent::ThresholdsChanged(Thresholds::default())), 0);
    }

    #[tokio::test]
    async fn every_listener_receives_the_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.publish(DashboardEvent::ThresholdsChanged(Thresholds::default())), 2);
        assert!(matches!(a.recv().await.unwrap(), DashboardEvent::ThresholdsChanged(_)));
        assert!(matches!(b.recv().await.unwrap(), DashboardEvent::ThresholdsChanged(_)));
    }
}
