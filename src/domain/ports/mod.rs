//! Port trait definitions
//!
//! The orchestration core reaches its collaborators only through these traits:
//! - CatalogSource: per-city resource catalogs
//! - ConversationStore: session-scoped persistence of slots and history
//! - TelemetrySink: transition and tool-invocation audit trail
//! - Clock: wall time and pacing delays

pub mod catalog;
pub mod clock;
pub mod conversation_store;
pub mod telemetry;

pub use catalog::CatalogSource;
pub use clock::Clock;
pub use conversation_store::{ConversationStore, StoredConversation};
pub use telemetry::{TelemetryEvent, TelemetrySink};
