use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ConversationContext, SlotEvidence, SlotRecord};

/// The session-scoped slice of a conversation worth keeping between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConversation {
    pub conversation_id: String,
    pub slots: SlotRecord,
    pub evidence: SlotEvidence,
    /// Most recent utterances, already scrubbed of personal data.
    pub messages: Vec<String>,
    pub ask_count: u32,
    pub saved_at: DateTime<Utc>,
}

impl StoredConversation {
    pub fn from_context(context: &ConversationContext, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id: context.id.clone(),
            slots: context.slots.clone(),
            evidence: context.evidence,
            messages: context.messages.iter().cloned().collect(),
            ask_count: context.ask_count,
            saved_at: now,
        }
    }

    /// Restore slots, evidence, messages and the ask counter into a fresh context.
    pub fn restore_into(self, context: &mut ConversationContext) {
        context.slots = self.slots;
        context.evidence = self.evidence;
        context.ask_count = self.ask_count;
        for message in self.messages {
            context.push_message(message);
        }
    }
}

/// Persistence port for conversations.
///
/// A missing record is a cold start, not an error.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Save or replace a conversation, refreshing its expiry.
    ///
    /// # Errors
    /// Returns error if the backend rejects the write
    async fn save(&self, conversation: StoredConversation) -> DomainResult<()>;

    /// Load a conversation that has not expired.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    async fn load(&self, conversation_id: &str) -> DomainResult<Option<StoredConversation>>;

    /// Delete a conversation. Deleting a missing record is not an error.
    ///
    /// # Errors
    /// Returns error if the backend rejects the delete
    async fn delete(&self, conversation_id: &str) -> DomainResult<()>;

    /// Drop every expired record, returning how many were removed.
    ///
    /// # Errors
    /// Returns error if the backend rejects the purge
    async fn purge_expired(&self) -> DomainResult<usize>;
}
