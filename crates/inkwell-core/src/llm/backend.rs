//! ChatBackend and ChatBackendFactory trait definitions.

use std::pin::Pin;

use futures_util::Stream;

use inkwell_types::chat::{ByoAccount, ChatTurn};
use inkwell_types::error::ChatError;
use inkwell_types::llm::{LlmError, ModelEntry};

use super::box_backend::BoxChatBackend;

/// Stream of text chunks from an upstream model.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send + 'static>>;

/// Trait for upstream chat model backends.
///
/// The `stream` method returns a boxed stream because streams need to be
/// object-safe for the `BoxChatBackend` wrapper.
///
/// Implementations live in inkwell-infra (e.g., `OpenAiCompatBackend`).
pub trait ChatBackend: Send + Sync {
    /// Human-readable backend name (e.g., "dashscope/qwen-plus").
    fn name(&self) -> &str;

    /// Stream a completion for the given conversation. Chunks are plain
    /// text deltas in generation order.
    fn stream(&self, turns: Vec<ChatTurn>) -> ChunkStream;
}

/// Resolves model ids to backends.
///
/// `backend_for` serves the managed catalog; `byo_backend` builds a
/// backend from caller-supplied credentials. Both reject models the
/// service does not offer.
pub trait ChatBackendFactory: Send + Sync {
    /// List the models the service offers.
    fn models(&self) -> Vec<ModelEntry>;

    /// Resolve a catalog model id to a backend using service credentials.
    fn backend_for(&self, model: &str) -> Result<BoxChatBackend, ChatError>;

    /// Build a backend from the caller's own credentials.
    fn byo_backend(
        &self,
        model: &str,
        account: &ByoAccount,
    ) -> Result<BoxChatBackend, ChatError>;
}
