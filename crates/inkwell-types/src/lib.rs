//! Shared domain types for Inkwell.
//!
//! This crate contains the core domain types used across the Inkwell chat
//! service: conversation turns, admission/quota decisions, model catalog
//! entries, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
