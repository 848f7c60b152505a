//! Chat orchestration logic and trait definitions for Inkwell.
//!
//! This crate defines the "ports" (storage and backend traits) that the
//! infrastructure layer implements, plus the orchestration pipeline built
//! on top of them: input validation, admission control, history
//! compression, quota accounting, and the streaming chat state machine.
//! It depends only on `inkwell-types` -- never on `inkwell-infra` or any
//! database/IO crate.

pub mod admission;
pub mod chat;
pub mod history;
pub mod llm;
pub mod quota;
pub mod storage;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testutil;
