//! Shared test doubles for the orchestration pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::stream;

use inkwell_types::chat::ChatTurn;
use inkwell_types::error::StoreError;
use inkwell_types::llm::LlmError;

use crate::llm::backend::{ChatBackend, ChunkStream};
use crate::storage::ExpiringKvStore;

/// In-memory `ExpiringKvStore` with real (wall-clock) expiry.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpiringKvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn incr_by_ex(&self, key: &str, delta: u64, ttl: Duration) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let live = entries.get(key).filter(|e| !e.is_expired());
        let current = live
            .and_then(|e| e.value.parse::<u64>().ok())
            .unwrap_or(0);
        // Creation sets the TTL; later increments keep the original expiry.
        let expires_at = match live {
            Some(entry) => entry.expires_at,
            None => Instant::now().checked_add(ttl),
        };
        let total = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: total.to_string(),
                expires_at,
            },
        );
        Ok(total)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// `ExpiringKvStore` that fails every operation, for outage-path tests.
pub struct FailingKvStore;

impl ExpiringKvStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("simulated outage".into()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("simulated outage".into()))
    }

    async fn incr_by_ex(&self, _key: &str, _delta: u64, _ttl: Duration) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("simulated outage".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("simulated outage".into()))
    }
}

/// `ChatBackend` that replays a fixed script of chunks.
pub struct ScriptedBackend {
    script: Vec<ScriptItem>,
    calls: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
}

#[derive(Clone)]
enum ScriptItem {
    Chunk(String),
    StreamError,
}

impl ScriptedBackend {
    /// Backend that streams the given chunks and completes cleanly.
    pub fn ok(chunks: &[&str]) -> Self {
        Self {
            script: chunks
                .iter()
                .map(|c| ScriptItem::Chunk((*c).to_string()))
                .collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend that streams the given chunks, then fails.
    pub fn failing_after(chunks: &[&str]) -> Self {
        let mut script: Vec<ScriptItem> = chunks
            .iter()
            .map(|c| ScriptItem::Chunk((*c).to_string()))
            .collect();
        script.push(ScriptItem::StreamError);
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the conversations this backend has been asked to stream.
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<ChatTurn>>>> {
        Arc::clone(&self.calls)
    }
}

impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn stream(&self, turns: Vec<ChatTurn>) -> ChunkStream {
        self.calls.lock().unwrap().push(turns);
        let items: Vec<Result<String, LlmError>> = self
            .script
            .iter()
            .cloned()
            .map(|item| match item {
                ScriptItem::Chunk(text) => Ok(text),
                ScriptItem::StreamError => Err(LlmError::Stream("scripted failure".into())),
            })
            .collect();
        Box::pin(stream::iter(items))
    }
}
