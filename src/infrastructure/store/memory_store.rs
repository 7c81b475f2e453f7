//! In-memory conversation store with a time-to-live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::ports::{Clock, ConversationStore, StoredConversation};

#[derive(Debug, Clone)]
struct Entry {
    conversation: StoredConversation,
    expires_at: DateTime<Utc>,
}

/// Keeps conversations in a map keyed by id. Records expire `ttl` after
/// their last save; expired records read as missing.
pub struct InMemoryConversationStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryConversationStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(4)),
            clock,
        }
    }

    /// Number of records held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: StoredConversation) -> DomainResult<()> {
        let expires_at = self.clock.now() + self.ttl;
        let mut entries = self.entries.write().await;
        entries.insert(
            conversation.conversation_id.clone(),
            Entry {
                conversation,
                expires_at,
            },
        );
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> DomainResult<Option<StoredConversation>> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(conversation_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.conversation.clone()))
    }

    async fn delete(&self, conversation_id: &str) -> DomainResult<()> {
        self.entries.write().await.remove(conversation_id);
        Ok(())
    }

    async fn purge_expired(&self) -> DomainResult<usize> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Purged expired conversations");
        }
        Ok(purged)
    }
}
