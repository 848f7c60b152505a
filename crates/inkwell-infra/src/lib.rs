//! Infrastructure implementations for Inkwell.
//!
//! Implements the traits defined in `inkwell-core`: the expiring KV store
//! over SQLite, and chat backends over OpenAI-compatible provider APIs.

pub mod config;
pub mod llm;
pub mod sqlite;
