use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One audit record: a mode transition, a rejected transition or a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub at: DateTime<Utc>,
    pub conversation_id: String,
    /// Event name, e.g. `mode_transition` or `tool_invocation`.
    pub event: String,
    pub payload: serde_json::Value,
}

/// Receiver of the audit trail. Must never block the caller.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: TelemetryEvent);
}
