//! Telemetry sinks for transitions and tool invocations.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::info;

use crate::domain::ports::{TelemetryEvent, TelemetrySink};

/// Forwards every event to `tracing` under the `concierge::telemetry` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        info!(
            target: "concierge::telemetry",
            conversation_id = %event.conversation_id,
            event = %event.event,
            at = %event.at.to_rfc3339(),
            payload = %event.payload,
            "telemetry"
        );
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Keeps the most recent events in memory, oldest dropped first.
#[derive(Debug)]
pub struct RecordingTelemetrySink {
    capacity: usize,
    events: Mutex<VecDeque<TelemetryEvent>>,
}

impl RecordingTelemetrySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn events_named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events().into_iter().filter(|e| e.event == name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.capacity {
                events.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(name: &str) -> TelemetryEvent {
        TelemetryEvent {
            at: Utc::now(),
            conversation_id: "c1".to_string(),
            event: name.to_string(),
            payload: json!({}),
        }
    }

    #[test]
    fn test_recording_sink_is_bounded() {
        let sink = RecordingTelemetrySink::new(2);
        sink.emit(event("a"));
        sink.emit(event("b"));
        sink.emit(event("c"));
        let names: Vec<_> = sink.events().into_iter().map(|e| e.event).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(sink.events_named("c").len(), 1);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_and_tracing_sinks_accept_events() {
        NullTelemetrySink.emit(event("x"));
        TracingTelemetrySink.emit(event("y"));
    }
}
