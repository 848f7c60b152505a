//! Streaming chat orchestration.

pub mod orchestrator;

pub use orchestrator::{ChatOrchestrator, ChatStreamHandle};
