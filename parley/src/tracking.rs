//! Analytics tracking.
//!
//! Handlers report product events with [`Conversation::track`]. Events are
//! handed to a [`Tracker`] without waiting for delivery; a slow or failing
//! analytics backend never holds up the turn.
//!
//! [`Conversation::track`]: crate::conversation::Conversation::track

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::conversation::Conversation;

/// An analytics event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedEvent {
    /// Event name.
    pub event: String,
    /// Event payload.
    pub data: Value,
    /// Stable identifier of the user.
    pub user_id: String,
    /// User properties gathered by the skill's [`DataCollector`].
    #[serde(skip_serializing_if = "Value::is_null")]
    pub user_data: Value,
}

/// Analytics sink.
pub trait Tracker: Send + Sync {
    /// Record an event. Must not block; implementations that do I/O should
    /// queue or spawn.
    fn track(&self, event: TrackedEvent);
}

/// Gathers user properties to attach to every tracked event.
pub type DataCollector = Arc<dyn Fn(&Conversation) -> Value + Send + Sync>;

/// Tracker that writes events to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracker;

impl Tracker for LogTracker {
    fn track(&self, event: TrackedEvent) {
        info!(
            event = %event.event,
            user_id = %event.user_id,
            data = %event.data,
            user_data = %event.user_data,
            "tracked event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serialization() {
        let event = TrackedEvent {
            event: "answer".into(),
            data: json!({"correct": true}),
            user_id: "u1".into(),
            user_data: Value::Null,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "answer", "data": {"correct": true}, "user_id": "u1"})
        );
        LogTracker.track(event);
    }
}
