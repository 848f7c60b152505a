//! BoxChatBackend -- object-safe dynamic dispatch wrapper for ChatBackend.
//!
//! 1. Define an object-safe `ChatBackendDyn` trait returning boxed streams
//! 2. Blanket-impl `ChatBackendDyn` for all `T: ChatBackend`
//! 3. `BoxChatBackend` wraps `Box<dyn ChatBackendDyn>` and delegates

use futures_util::StreamExt;

use inkwell_types::chat::ChatTurn;
use inkwell_types::llm::LlmError;

use super::backend::{ChatBackend, ChunkStream};

/// Object-safe version of [`ChatBackend`].
///
/// This trait exists solely to enable dynamic dispatch (`dyn ChatBackendDyn`).
/// A blanket implementation is provided for all types implementing `ChatBackend`.
pub trait ChatBackendDyn: Send + Sync {
    fn name(&self) -> &str;

    fn stream_boxed(&self, turns: Vec<ChatTurn>) -> ChunkStream;
}

/// Blanket implementation: any `ChatBackend` automatically implements `ChatBackendDyn`.
impl<T: ChatBackend> ChatBackendDyn for T {
    fn name(&self) -> &str {
        ChatBackend::name(self)
    }

    fn stream_boxed(&self, turns: Vec<ChatTurn>) -> ChunkStream {
        self.stream(turns)
    }
}

/// Type-erased chat backend for runtime model selection.
///
/// Wraps any `ChatBackend` implementation behind dynamic dispatch. The
/// orchestrator picks a backend per request based on the requested model,
/// so it cannot name a concrete backend type at compile time.
pub struct BoxChatBackend {
    inner: Box<dyn ChatBackendDyn + Send + Sync>,
}

impl std::fmt::Debug for BoxChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxChatBackend")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

impl BoxChatBackend {
    /// Wrap a concrete `ChatBackend` in a type-erased box.
    pub fn new<T: ChatBackend + 'static>(backend: T) -> Self {
        Self {
            inner: Box::new(backend),
        }
    }

    /// Human-readable backend name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Stream a completion for the given conversation.
    pub fn stream(&self, turns: Vec<ChatTurn>) -> ChunkStream {
        self.inner.stream_boxed(turns)
    }

    /// Run a completion to the end and return the concatenated text.
    ///
    /// Used for internal calls (history summarization) where streaming
    /// buys nothing.
    pub async fn complete(&self, turns: Vec<ChatTurn>) -> Result<String, LlmError> {
        let mut stream = self.stream(turns);
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedBackend;
    use inkwell_types::chat::TurnRole;

    #[tokio::test]
    async fn test_complete_concatenates_chunks() {
        let backend = BoxChatBackend::new(ScriptedBackend::ok(&["Hello", ", ", "world"]));
        let turns = vec![ChatTurn::now(TurnRole::User, "hi")];
        let text = backend.complete(turns).await.unwrap();
        assert_eq!(text, "Hello, world");
    }

    #[tokio::test]
    async fn test_complete_propagates_stream_error() {
        let backend = BoxChatBackend::new(ScriptedBackend::failing_after(&["partial"]));
        let turns = vec![ChatTurn::now(TurnRole::User, "hi")];
        let err = backend.complete(turns).await.unwrap_err();
        assert!(matches!(err, LlmError::Stream(_)));
    }

    #[test]
    fn test_name_delegates() {
        let backend = BoxChatBackend::new(ScriptedBackend::ok(&[]));
        assert_eq!(backend.name(), "scripted");
    }
}
