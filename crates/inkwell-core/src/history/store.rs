//! Conversation history persistence.
//!
//! Each user's history is one JSON array under an expiring key, refreshed
//! on every write so an idle conversation ages out after the configured
//! TTL. Retention caps are applied on write, never on read.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use inkwell_types::chat::ChatTurn;
use inkwell_types::config::HistoryLimits;
use inkwell_types::error::StoreError;

use crate::history::limits::enforce_caps;
use crate::storage::ExpiringKvStore;

fn history_key(user_id: &str) -> String {
    format!("chat:history:{user_id}")
}

/// Stores per-user conversation history behind an [`ExpiringKvStore`].
///
/// Generic over the store to maintain clean architecture (inkwell-core
/// never depends on inkwell-infra).
pub struct HistoryStore<K> {
    kv: Arc<K>,
    limits: HistoryLimits,
}

impl<K: ExpiringKvStore> HistoryStore<K> {
    pub fn new(kv: Arc<K>, limits: HistoryLimits) -> Self {
        Self { kv, limits }
    }

    /// Load a user's history, oldest turn first.
    ///
    /// A corrupted payload is treated as absent: history is advisory
    /// context, so losing it beats failing the request.
    pub async fn load(&self, user_id: &str) -> Result<Vec<ChatTurn>, StoreError> {
        let Some(raw) = self.kv.get(&history_key(user_id)).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<ChatTurn>>(&raw) {
            Ok(mut turns) => {
                turns.sort_by_key(|t| t.created_at);
                Ok(turns)
            }
            Err(err) => {
                warn!(user_id, %err, "discarding undecodable history payload");
                Ok(Vec::new())
            }
        }
    }

    /// Append turns to a user's history, enforce caps, refresh the TTL.
    pub async fn append(&self, user_id: &str, new_turns: &[ChatTurn]) -> Result<(), StoreError> {
        let mut turns = self.load(user_id).await?;
        turns.extend_from_slice(new_turns);
        self.replace(user_id, turns).await
    }

    /// Replace a user's history wholesale, enforce caps, refresh the TTL.
    ///
    /// Used to persist a compressed conversation so the summarization
    /// cost is paid once, not on every following request.
    pub async fn replace(&self, user_id: &str, turns: Vec<ChatTurn>) -> Result<(), StoreError> {
        let turns = enforce_caps(turns, &self.limits);
        let raw = serde_json::to_string(&turns)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv
            .set_ex(
                &history_key(user_id),
                &raw,
                Duration::from_secs(self.limits.ttl_secs),
            )
            .await
    }

    /// Delete a user's history.
    pub async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        self.kv.delete(&history_key(user_id)).await
    }
}
