//! Storage trait definitions.

pub mod kv;

pub use kv::ExpiringKvStore;
