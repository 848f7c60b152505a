//! Chat backend abstraction.
//!
//! `ChatBackend` is the seam between orchestration and the upstream model
//! providers; `BoxChatBackend` erases it for runtime model selection, and
//! `ChatBackendFactory` resolves catalog model ids (or bring-your-own
//! credentials) to backends. Implementations live in inkwell-infra.

pub mod backend;
pub mod box_backend;

pub use backend::{ChatBackend, ChatBackendFactory, ChunkStream};
pub use box_backend::BoxChatBackend;
