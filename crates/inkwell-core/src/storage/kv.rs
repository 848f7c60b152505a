//! Expiring key-value store trait.
//!
//! Defines the interface for string-keyed storage with per-key expiry and
//! an atomic counter primitive. Conversation history and daily quota
//! counters both live behind this trait.
//! Implementations live in inkwell-infra.

use std::time::Duration;

use inkwell_types::error::StoreError;

/// Trait for string-keyed storage with per-key expiry.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in inkwell-infra.
pub trait ExpiringKvStore: Send + Sync {
    /// Get a value by key. Returns None if the key is absent or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Set a value with a fresh time-to-live (upsert).
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Atomically add `delta` to a numeric key and return the new total.
    ///
    /// A missing or expired key counts as zero. The TTL is applied only
    /// when the key is created; an existing key keeps its expiry so a
    /// counter's window is anchored to its first increment.
    fn incr_by_ex(
        &self,
        key: &str,
        delta: u64,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
