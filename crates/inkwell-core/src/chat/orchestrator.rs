//! Streaming chat orchestrator.
//!
//! `ChatOrchestrator` runs the full request pipeline: validate, gate on
//! quota, acquire a concurrency slot, fit history into the input budget,
//! relay the upstream stream, then finalize. Errors before the first byte
//! surface as [`ChatError`]; once streaming has begun, stop and upstream
//! failure are reported inline with text markers so the already-open
//! response stays well-formed.
//!
//! The user turn is written to history before the stream opens (seeding a
//! system turn on first contact). Finalization always runs: the assistant
//! turn is persisted (partial output included) and metered usage recorded,
//! and the admission ticket is dropped with the stream, returning the slot
//! on every exit path.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tracing::{info, warn};

use inkwell_types::chat::{
    ActiveRequest, AdmissionSnapshot, ByoChatRequest, ChatRequest, ChatTurn, TurnRole, UsageReport,
    ERROR_MARKER, STOP_MARKER,
};
use inkwell_types::config::ChatConfig;
use inkwell_types::error::{AdmissionError, ChatError};
use inkwell_types::llm::{LlmError, ModelEntry};

use crate::admission::AdmissionController;
use crate::history::{HistoryCompressor, HistoryStore};
use crate::llm::{BoxChatBackend, ChatBackendFactory};
use crate::quota::QuotaTracker;
use crate::storage::ExpiringKvStore;
use crate::tokens::{char_len, estimate_units, history_budget};

/// An admitted, running chat stream.
///
/// `ticket_id` identifies the request for stop calls; the stream yields
/// text chunks and is infallible -- abnormal endings are inline markers.
pub struct ChatStreamHandle {
    pub ticket_id: String,
    pub stream: Pin<Box<dyn Stream<Item = String> + Send + 'static>>,
}

impl std::fmt::Debug for ChatStreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamHandle")
            .field("ticket_id", &self.ticket_id)
            .finish_non_exhaustive()
    }
}

/// Coordinates history, quota, admission, and backends for chat requests.
///
/// Generic over the KV store and backend factory to maintain clean
/// architecture (inkwell-core never depends on inkwell-infra).
pub struct ChatOrchestrator<K, F> {
    history: Arc<HistoryStore<K>>,
    quota: Arc<QuotaTracker<K>>,
    admission: Arc<AdmissionController>,
    factory: Arc<F>,
    config: ChatConfig,
    system_prompt: String,
}

impl<K, F> ChatOrchestrator<K, F>
where
    K: ExpiringKvStore + 'static,
    F: ChatBackendFactory,
{
    pub fn new(
        history: Arc<HistoryStore<K>>,
        quota: Arc<QuotaTracker<K>>,
        admission: Arc<AdmissionController>,
        factory: Arc<F>,
        config: ChatConfig,
        system_prompt: String,
    ) -> Self {
        Self {
            history,
            quota,
            admission,
            factory,
            config,
            system_prompt,
        }
    }

    /// Start a managed (service-credentialed, metered) chat stream.
    #[tracing::instrument(name = "stream_chat", skip(self, request), fields(user_id, model = %request.model))]
    pub async fn stream_chat(
        &self,
        user_id: &str,
        request: ChatRequest,
    ) -> Result<ChatStreamHandle, ChatError> {
        let backend = self.factory.backend_for(&request.model)?;
        self.run(user_id, request.message, backend, true).await
    }

    /// Start a bring-your-own-account chat stream.
    ///
    /// BYO requests use the caller's credentials upstream, so they bypass
    /// quota gating and metering entirely.
    #[tracing::instrument(name = "stream_chat_byo", skip(self, request), fields(user_id, model = %request.model))]
    pub async fn stream_chat_byo(
        &self,
        user_id: &str,
        request: ByoChatRequest,
    ) -> Result<ChatStreamHandle, ChatError> {
        let backend = self.factory.byo_backend(&request.model, &request.account)?;
        self.run(user_id, request.message, backend, false).await
    }

    async fn run(
        &self,
        user_id: &str,
        message: String,
        backend: BoxChatBackend,
        metered: bool,
    ) -> Result<ChatStreamHandle, ChatError> {
        // Validate
        if message.trim().is_empty() {
            return Err(ChatError::Validation("message must not be empty".into()));
        }
        let msg_chars = char_len(&message);
        if msg_chars > self.config.input.max_message_chars {
            return Err(ChatError::MessageTooLong {
                length: msg_chars,
                limit: self.config.input.max_message_chars,
            });
        }

        // Gate on today's quota before taking a slot.
        if metered {
            let decision = self.quota.check(user_id).await?;
            if !decision.can_use {
                return Err(ChatError::QuotaExceeded {
                    used: decision.current_usage,
                    limit: decision.limit,
                });
            }
        }

        // Acquire a concurrency slot (may queue).
        let ticket = self.admission.acquire(user_id).await.map_err(|e| match e {
            AdmissionError::QueueFull | AdmissionError::Timeout => ChatError::ServerBusy {
                snapshot: self.admission.snapshot(),
            },
            AdmissionError::Stopped => ChatError::StoppedByUser,
        })?;

        // Fit history into what the input budget leaves.
        let system_chars = char_len(&self.system_prompt);
        let Some(budget) = history_budget(&self.config.input, msg_chars, system_chars) else {
            return Err(ChatError::InputTooLong);
        };
        let history = match self.history.load(user_id).await {
            Ok(turns) => turns,
            Err(err) => {
                warn!(user_id, %err, "history unavailable, continuing without context");
                Vec::new()
            }
        };
        let compressed =
            HistoryCompressor::fit(&backend, history, &self.config.history, budget).await;
        let history = compressed.turns;
        if compressed.summarized {
            // Persist the summarized history so the summarization cost is
            // paid once, not on every following request. Truncation-only
            // results are not written back; the stored turns stay intact.
            if let Err(err) = self.history.replace(user_id, history.clone()).await {
                warn!(user_id, %err, "failed to persist compressed history");
            }
        }

        // Record the user turn before streaming begins, seeding the system
        // turn on first contact so the stored transcript is self-contained.
        let mut opening = Vec::with_capacity(2);
        if history.is_empty() && !self.system_prompt.is_empty() {
            opening.push(ChatTurn::now(TurnRole::System, self.system_prompt.clone()));
        }
        opening.push(ChatTurn::now(TurnRole::User, message.clone()));
        if let Err(err) = self.history.append(user_id, &opening).await {
            warn!(user_id, %err, "failed to persist user turn");
        }

        let mut turns = Vec::with_capacity(history.len() + 2);
        if !self.system_prompt.is_empty()
            && !history.iter().any(|t| t.role == TurnRole::System)
        {
            turns.push(ChatTurn::now(TurnRole::System, self.system_prompt.clone()));
        }
        turns.extend(history);
        turns.push(ChatTurn::now(TurnRole::User, message.clone()));

        let ticket_id = ticket.id().to_string();
        let cancel = ticket.cancel_token().clone();
        let chunks = backend.stream(turns);
        info!(user_id, ticket_id, backend = backend.name(), "chat stream admitted");

        // Capture what finalization needs; the ticket rides along so the
        // slot is released when the stream is dropped or finishes.
        let history_store = Arc::clone(&self.history);
        let quota = Arc::clone(&self.quota);
        let user_id = user_id.to_string();
        let user_message = message;

        enum Step {
            Chunk(String),
            Stop,
            Fail(LlmError),
            Done,
        }

        let stream = async_stream::stream! {
            let _ticket = ticket;
            let mut chunks = chunks;
            let mut full_response = String::new();

            loop {
                let step = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Step::Stop,
                    chunk = chunks.next() => match chunk {
                        Some(Ok(text)) => Step::Chunk(text),
                        Some(Err(err)) => Step::Fail(err),
                        None => Step::Done,
                    },
                };
                match step {
                    Step::Chunk(text) => {
                        full_response.push_str(&text);
                        yield text;
                    }
                    Step::Stop => {
                        info!(user_id, "generation stopped by user");
                        yield STOP_MARKER.to_string();
                        break;
                    }
                    Step::Fail(err) => {
                        warn!(user_id, %err, "upstream failed mid-generation");
                        yield ERROR_MARKER.to_string();
                        break;
                    }
                    Step::Done => break,
                }
            }

            // Finalize: persist the assistant turn (partial output
            // included) and meter what was consumed.
            if !full_response.is_empty() {
                let reply = [ChatTurn::now(TurnRole::Assistant, full_response.clone())];
                if let Err(err) = history_store.append(&user_id, &reply).await {
                    warn!(user_id, %err, "failed to persist assistant turn");
                }
            }
            if metered {
                let units = estimate_units(&user_message)
                    + estimate_units(&full_response);
                if let Err(err) = quota.record(&user_id, units).await {
                    warn!(user_id, %err, "failed to record quota usage");
                }
            }
        };

        Ok(ChatStreamHandle {
            ticket_id,
            stream: Box::pin(stream),
        })
    }

    /// Stop all of a user's in-flight requests. Returns the ticket ids
    /// that were signalled.
    pub fn stop_all(&self, user_id: &str) -> Vec<String> {
        self.admission.stop_user(user_id)
    }

    /// Stop one of a user's requests by ticket id.
    pub fn stop_ticket(&self, user_id: &str, ticket_id: &str) -> bool {
        self.admission.stop_ticket(user_id, ticket_id)
    }

    /// Current admission load.
    pub fn admission_snapshot(&self) -> AdmissionSnapshot {
        self.admission.snapshot()
    }

    /// The user's in-flight requests.
    pub fn active_requests(&self, user_id: &str) -> Vec<ActiveRequest> {
        self.admission.requests_for(user_id)
    }

    /// The models the service offers.
    pub fn models(&self) -> Vec<ModelEntry> {
        self.factory.models()
    }

    /// The user's stored conversation history.
    pub async fn history(&self, user_id: &str) -> Result<Vec<ChatTurn>, ChatError> {
        Ok(self.history.load(user_id).await?)
    }

    /// Delete the user's conversation history.
    pub async fn clear_history(&self, user_id: &str) -> Result<(), ChatError> {
        self.history.clear(user_id).await?;
        info!(user_id, "history cleared");
        Ok(())
    }

    /// Today's usage for display. Reads fail open to zero.
    pub async fn usage_report(&self, user_id: &str) -> UsageReport {
        UsageReport::new(self.quota.usage(user_id).await, self.quota.daily_limit())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::mpsc;

    use super::*;
    use crate::llm::backend::{ChatBackend, ChunkStream};
    use crate::testutil::{MemoryKvStore, ScriptedBackend};
    use inkwell_types::chat::ByoAccount;
    use inkwell_types::config::{ConcurrencyLimits, InputLimits, QuotaLimits};
    use inkwell_types::llm::ProviderKind;

    const TEST_MODEL: &str = "test-model";
    const SYSTEM_PROMPT: &str = "You are a helpful writing assistant.";

    /// Factory handing out pre-built backends in order.
    struct QueueFactory {
        backends: Mutex<VecDeque<BoxChatBackend>>,
    }

    impl QueueFactory {
        fn new(backends: Vec<BoxChatBackend>) -> Self {
            Self {
                backends: Mutex::new(backends.into()),
            }
        }

        fn next_backend(&self, model: &str) -> Result<BoxChatBackend, ChatError> {
            if model != TEST_MODEL {
                return Err(ChatError::UnsupportedModel(model.to_string()));
            }
            self.backends
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ChatError::Validation("no backend scripted".into()))
        }
    }

    impl ChatBackendFactory for QueueFactory {
        fn models(&self) -> Vec<ModelEntry> {
            vec![ModelEntry {
                id: TEST_MODEL.to_string(),
                display_name: "Test Model".to_string(),
                provider: ProviderKind::Deepseek,
            }]
        }

        fn backend_for(&self, model: &str) -> Result<BoxChatBackend, ChatError> {
            self.next_backend(model)
        }

        fn byo_backend(
            &self,
            model: &str,
            _account: &ByoAccount,
        ) -> Result<BoxChatBackend, ChatError> {
            self.next_backend(model)
        }
    }

    /// Backend whose chunks are fed through a channel by the test.
    struct ChannelBackend {
        rx: Mutex<Option<mpsc::UnboundedReceiver<Result<String, LlmError>>>>,
    }

    impl ChannelBackend {
        fn new(rx: mpsc::UnboundedReceiver<Result<String, LlmError>>) -> Self {
            Self {
                rx: Mutex::new(Some(rx)),
            }
        }
    }

    impl ChatBackend for ChannelBackend {
        fn name(&self) -> &str {
            "channel"
        }

        fn stream(&self, _turns: Vec<ChatTurn>) -> ChunkStream {
            let mut rx = self.rx.lock().unwrap().take().expect("stream taken twice");
            Box::pin(async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            })
        }
    }

    fn orchestrator_full(
        config: ChatConfig,
        backends: Vec<BoxChatBackend>,
    ) -> (
        ChatOrchestrator<MemoryKvStore, QueueFactory>,
        Arc<HistoryStore<MemoryKvStore>>,
        Arc<AdmissionController>,
    ) {
        let kv = Arc::new(MemoryKvStore::new());
        let history = Arc::new(HistoryStore::new(Arc::clone(&kv), config.history.clone()));
        let quota = Arc::new(QuotaTracker::new(Arc::clone(&kv), config.quota.clone()));
        let admission = AdmissionController::new(config.concurrency.clone());
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&history),
            quota,
            Arc::clone(&admission),
            Arc::new(QueueFactory::new(backends)),
            config,
            SYSTEM_PROMPT.to_string(),
        );
        (orchestrator, history, admission)
    }

    fn orchestrator_with(
        config: ChatConfig,
        backends: Vec<BoxChatBackend>,
    ) -> (
        ChatOrchestrator<MemoryKvStore, QueueFactory>,
        Arc<AdmissionController>,
    ) {
        let (orchestrator, _, admission) = orchestrator_full(config, backends);
        (orchestrator, admission)
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            model: TEST_MODEL.to_string(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_streams_persists_and_meters() {
        let (orchestrator, admission) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ScriptedBackend::ok(&["Once", " upon"]))],
        );

        let handle = orchestrator
            .stream_chat("u1", request("hi"))
            .await
            .unwrap();
        assert!(!handle.ticket_id.is_empty());
        assert!(format!("{handle:?}").contains(&handle.ticket_id));

        let chunks: Vec<String> = handle.stream.collect().await;
        assert_eq!(chunks, vec!["Once".to_string(), " upon".to_string()]);

        let history = orchestrator.history("u1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, TurnRole::System);
        assert_eq!(history[0].content, SYSTEM_PROMPT);
        assert_eq!(history[1].role, TurnRole::User);
        assert_eq!(history[1].content, "hi");
        assert_eq!(history[2].role, TurnRole::Assistant);
        assert_eq!(history[2].content, "Once upon");

        let usage = orchestrator.usage_report("u1").await;
        assert_eq!(
            usage.used,
            estimate_units("hi") + estimate_units("Once upon")
        );

        // Slot returned once the stream finished.
        assert_eq!(admission.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (orchestrator, _) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ScriptedBackend::ok(&[]))],
        );
        let err = orchestrator
            .stream_chat("u1", request("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let config = ChatConfig {
            input: InputLimits {
                max_message_chars: 5,
                ..InputLimits::default()
            },
            ..ChatConfig::default()
        };
        let (orchestrator, _) = orchestrator_with(
            config,
            vec![BoxChatBackend::new(ScriptedBackend::ok(&[]))],
        );
        let err = orchestrator
            .stream_chat("u1", request("helloworld"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::MessageTooLong {
                length: 10,
                limit: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_unsupported_model_rejected() {
        let (orchestrator, _) = orchestrator_with(ChatConfig::default(), vec![]);
        let err = orchestrator
            .stream_chat(
                "u1",
                ChatRequest {
                    message: "hi".into(),
                    model: "gpt-unknown".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedModel(m) if m == "gpt-unknown"));
    }

    #[tokio::test]
    async fn test_quota_exceeded_blocks_next_request() {
        let config = ChatConfig {
            quota: QuotaLimits {
                free_daily_words: 1,
            },
            ..ChatConfig::default()
        };
        let (orchestrator, _) = orchestrator_with(
            config,
            vec![
                BoxChatBackend::new(ScriptedBackend::ok(&["a long enough response"])),
                BoxChatBackend::new(ScriptedBackend::ok(&["never reached"])),
            ],
        );

        let handle = orchestrator
            .stream_chat("u1", request("hello"))
            .await
            .unwrap();
        let _: Vec<String> = handle.stream.collect().await;

        let err = orchestrator
            .stream_chat("u1", request("again"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_input_budget_exhausted_rejects_and_releases_slot() {
        let config = ChatConfig {
            input: InputLimits {
                max_total_input_chars: 50,
                max_message_chars: 40,
                safety_buffer_chars: 45,
            },
            ..ChatConfig::default()
        };
        let (orchestrator, admission) = orchestrator_with(
            config,
            vec![BoxChatBackend::new(ScriptedBackend::ok(&[]))],
        );

        let err = orchestrator
            .stream_chat("u1", request("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InputTooLong));
        assert_eq!(admission.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_server_busy_when_full() {
        let config = ChatConfig {
            concurrency: ConcurrencyLimits {
                max_concurrent: 1,
                queue_capacity: 0,
                ..ConcurrencyLimits::default()
            },
            ..ChatConfig::default()
        };
        let (orchestrator, admission) = orchestrator_with(
            config,
            vec![
                BoxChatBackend::new(ScriptedBackend::ok(&["held"])),
                BoxChatBackend::new(ScriptedBackend::ok(&["rejected"])),
            ],
        );

        // First stream holds its slot until dropped.
        let held = orchestrator
            .stream_chat("u1", request("hi"))
            .await
            .unwrap();

        let err = orchestrator
            .stream_chat("u2", request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ServerBusy { snapshot } if snapshot.active == 1));

        drop(held);
        assert_eq!(admission.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_yields_error_marker_and_keeps_partial() {
        let (orchestrator, _) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ScriptedBackend::failing_after(&["Hi"]))],
        );

        let handle = orchestrator
            .stream_chat("u1", request("hello"))
            .await
            .unwrap();
        let chunks: Vec<String> = handle.stream.collect().await;
        assert_eq!(chunks, vec!["Hi".to_string(), ERROR_MARKER.to_string()]);

        let history = orchestrator.history("u1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].content, "Hi");

        // The consumed tokens still count.
        let usage = orchestrator.usage_report("u1").await;
        assert_eq!(usage.used, estimate_units("hello") + estimate_units("Hi"));
    }

    #[tokio::test]
    async fn test_stop_mid_stream_yields_marker_and_persists_partial() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (orchestrator, admission) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ChannelBackend::new(rx))],
        );

        let handle = orchestrator
            .stream_chat("u1", request("tell me a story"))
            .await
            .unwrap();
        let ticket_id = handle.ticket_id.clone();
        let mut stream = handle.stream;

        tx.send(Ok("first ".to_string())).unwrap();
        assert_eq!(stream.next().await.unwrap(), "first ");

        assert!(orchestrator.stop_ticket("u1", &ticket_id));
        assert_eq!(stream.next().await.unwrap(), STOP_MARKER);
        assert!(stream.next().await.is_none());

        let history = orchestrator.history("u1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].content, "first ");

        let usage = orchestrator.usage_report("u1").await;
        assert!(usage.used > 0);
        assert_eq!(admission.snapshot().active, 0);
    }

    #[tokio::test]
    async fn test_byo_bypasses_quota() {
        let (orchestrator, _) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ScriptedBackend::ok(&["reply"]))],
        );

        let handle = orchestrator
            .stream_chat_byo(
                "u1",
                ByoChatRequest {
                    message: "hi".into(),
                    model: TEST_MODEL.into(),
                    account: ByoAccount {
                        api_key: "sk-user-own".into(),
                        base_url: None,
                    },
                },
            )
            .await
            .unwrap();
        let chunks: Vec<String> = handle.stream.collect().await;
        assert_eq!(chunks, vec!["reply".to_string()]);

        // History is kept, usage is not metered.
        assert_eq!(orchestrator.history("u1").await.unwrap().len(), 3);
        assert_eq!(orchestrator.usage_report("u1").await.used, 0);
    }

    #[tokio::test]
    async fn test_models_lists_catalog() {
        let (orchestrator, _) = orchestrator_with(ChatConfig::default(), vec![]);
        let models = orchestrator.models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, TEST_MODEL);
    }

    fn small_input_limits() -> InputLimits {
        InputLimits {
            max_total_input_chars: 400,
            max_message_chars: 50,
            safety_buffer_chars: 10,
        }
    }

    /// One oversized opener and five short recent turns, well over the
    /// history budget left by [`small_input_limits`].
    async fn seed_long_history(history: &HistoryStore<MemoryKvStore>) {
        let mut seeded = vec![ChatTurn::now(TurnRole::User, "x".repeat(500))];
        for i in 0..5 {
            seeded.push(ChatTurn::now(TurnRole::Assistant, format!("short {i}")));
        }
        history.append("u1", &seeded).await.unwrap();
    }

    #[tokio::test]
    async fn test_summarized_history_is_written_back() {
        let config = ChatConfig {
            input: small_input_limits(),
            ..ChatConfig::default()
        };
        let (orchestrator, history, _) = orchestrator_full(
            config,
            vec![BoxChatBackend::new(ScriptedBackend::ok(&["the gist"]))],
        );
        seed_long_history(&history).await;

        let handle = orchestrator
            .stream_chat("u1", request("hi"))
            .await
            .unwrap();
        let _: Vec<String> = handle.stream.collect().await;

        // The oversized opener was folded into a persisted summary turn,
        // even though the turn count came out the same as went in.
        let stored = history.load("u1").await.unwrap();
        assert!(stored[0].content.starts_with("[conversation summary]"));
        assert!(stored.iter().all(|t| char_len(&t.content) < 500));
        // Summary, five recent turns, then the new exchange.
        assert_eq!(stored.len(), 8);
    }

    #[tokio::test]
    async fn test_truncation_fallback_leaves_stored_turns_intact() {
        let config = ChatConfig {
            input: small_input_limits(),
            ..ChatConfig::default()
        };
        let (orchestrator, history, _) = orchestrator_full(
            config,
            vec![BoxChatBackend::new(ScriptedBackend::failing_after(&[]))],
        );
        seed_long_history(&history).await;

        let handle = orchestrator
            .stream_chat("u1", request("hi"))
            .await
            .unwrap();
        let _: Vec<String> = handle.stream.collect().await;

        // Summarization failed; the request went through on truncated
        // context but the stored turns were not discarded.
        let stored = history.load("u1").await.unwrap();
        assert!(stored.iter().any(|t| char_len(&t.content) == 500));
        assert!(!stored
            .iter()
            .any(|t| t.content.starts_with("[conversation summary]")));
    }

    #[tokio::test]
    async fn test_first_request_seeds_system_turn_once() {
        let (orchestrator, history, _) = orchestrator_full(
            ChatConfig::default(),
            vec![
                BoxChatBackend::new(ScriptedBackend::ok(&["one"])),
                BoxChatBackend::new(ScriptedBackend::ok(&["two"])),
            ],
        );

        let handle = orchestrator
            .stream_chat("u1", request("first"))
            .await
            .unwrap();
        // The system and user turns are on record before the stream is
        // consumed.
        let stored = history.load("u1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, TurnRole::System);
        assert_eq!(stored[0].content, SYSTEM_PROMPT);
        assert_eq!(stored[1].role, TurnRole::User);
        let _: Vec<String> = handle.stream.collect().await;

        let handle = orchestrator
            .stream_chat("u1", request("second"))
            .await
            .unwrap();
        let _: Vec<String> = handle.stream.collect().await;

        // Only the first contact seeds.
        let stored = history.load("u1").await.unwrap();
        let system_turns = stored.iter().filter(|t| t.role == TurnRole::System).count();
        assert_eq!(system_turns, 1);
        assert_eq!(stored.len(), 5);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let (orchestrator, _) = orchestrator_with(
            ChatConfig::default(),
            vec![BoxChatBackend::new(ScriptedBackend::ok(&["reply"]))],
        );
        let handle = orchestrator
            .stream_chat("u1", request("hi"))
            .await
            .unwrap();
        let _: Vec<String> = handle.stream.collect().await;
        assert!(!orchestrator.history("u1").await.unwrap().is_empty());

        orchestrator.clear_history("u1").await.unwrap();
        assert!(orchestrator.history("u1").await.unwrap().is_empty());
    }
}
