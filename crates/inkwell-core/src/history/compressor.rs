//! History compression for the per-request input budget.
//!
//! When a conversation no longer fits the character budget left after the
//! user's message and the system prompt, `HistoryCompressor` condenses the
//! older turns into a short summary and keeps the most recent turns
//! verbatim. If the summarization call itself fails, it falls back to
//! plain truncation so the request still goes through with less context.

use tracing::warn;

use inkwell_types::chat::{ChatTurn, TurnRole};
use inkwell_types::config::HistoryLimits;
use inkwell_types::llm::LlmError;

use crate::history::limits::total_chars;
use crate::llm::BoxChatBackend;

/// System prompt for the history summarization call.
const SUMMARY_SYSTEM_PROMPT: &str = r#"Summarize the following conversation segment concisely. Preserve:
1. Key decisions and conclusions
2. Important facts mentioned
3. The user's current goals and context

Keep the summary under 300 words. Write in third person (e.g., "The user asked about..." "The assistant suggested...")."#;

/// Outcome of a compression pass.
pub struct CompressedHistory {
    /// Turns fitting the budget, oldest first.
    pub turns: Vec<ChatTurn>,
    /// True when the older turns were folded into a summary turn. Only a
    /// summarized result is worth writing back to the store; truncation
    /// trims the request context without discarding stored turns.
    pub summarized: bool,
}

impl CompressedHistory {
    fn truncated(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            summarized: false,
        }
    }
}

/// Stateless utility for fitting conversation history into a budget.
pub struct HistoryCompressor;

impl HistoryCompressor {
    /// Fit `turns` into `budget_chars`, summarizing older turns if needed.
    ///
    /// Returns the turns unchanged when they already fit. Otherwise the
    /// most recent `recent_turns_kept` turns are preserved verbatim and
    /// everything before them is replaced by one summary turn. When the
    /// summarization call fails, or the summarized result still exceeds
    /// the budget, only the last `fallback_recent_turns` turns are kept,
    /// trimmed (oldest first) until they fit.
    #[tracing::instrument(
        name = "compress_history",
        skip(backend, turns, limits),
        fields(turn_count = turns.len(), budget_chars)
    )]
    pub async fn fit(
        backend: &BoxChatBackend,
        turns: Vec<ChatTurn>,
        limits: &HistoryLimits,
        budget_chars: usize,
    ) -> CompressedHistory {
        if total_chars(&turns) <= budget_chars {
            return CompressedHistory::truncated(turns);
        }

        if turns.len() <= limits.recent_turns_kept {
            return CompressedHistory::truncated(truncate_to_budget(turns, budget_chars));
        }

        let split = turns.len() - limits.recent_turns_kept;

        // If the recent turns alone bust the budget, a summary of the
        // older ones cannot help. Skip the model call.
        if total_chars(&turns[split..]) > budget_chars {
            return CompressedHistory::truncated(truncate_to_budget(
                turns[split..].to_vec(),
                budget_chars,
            ));
        }

        match Self::summarize(backend, &turns[..split]).await {
            Ok(summary) if !summary.is_empty() => {
                let mut result = Vec::with_capacity(limits.recent_turns_kept + 1);
                let mut summary_turn = ChatTurn::now(
                    TurnRole::Assistant,
                    format!("[conversation summary] {summary}"),
                );
                // Dated at the start of the summarized span so the turn
                // sorts before the verbatim turns it replaces.
                summary_turn.created_at = turns[0].created_at;
                result.push(summary_turn);
                result.extend_from_slice(&turns[split..]);
                if total_chars(&result) > budget_chars {
                    warn!("summary still over budget, falling back to truncation");
                    return CompressedHistory::truncated(fallback_truncate(
                        turns,
                        limits,
                        budget_chars,
                    ));
                }
                CompressedHistory {
                    turns: result,
                    summarized: true,
                }
            }
            Ok(_) => {
                warn!("summarization returned no text, falling back to truncation");
                CompressedHistory::truncated(fallback_truncate(turns, limits, budget_chars))
            }
            Err(err) => {
                warn!(%err, "history summarization failed, falling back to truncation");
                CompressedHistory::truncated(fallback_truncate(turns, limits, budget_chars))
            }
        }
    }

    /// Summarize a set of turns into a concise text summary.
    async fn summarize(backend: &BoxChatBackend, turns: &[ChatTurn]) -> Result<String, LlmError> {
        if turns.is_empty() {
            return Ok(String::new());
        }

        let conversation_text: String = turns
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = vec![
            ChatTurn::now(TurnRole::System, SUMMARY_SYSTEM_PROMPT),
            ChatTurn::now(
                TurnRole::User,
                format!(
                    "Please summarize this conversation:\n\n<conversation>\n{conversation_text}\n</conversation>"
                ),
            ),
        ];

        let summary = backend.complete(request).await?;
        Ok(summary.trim().to_string())
    }
}

/// Keep only the last `fallback_recent_turns`, trimmed to the budget.
fn fallback_truncate(
    turns: Vec<ChatTurn>,
    limits: &HistoryLimits,
    budget_chars: usize,
) -> Vec<ChatTurn> {
    let keep = limits.fallback_recent_turns.min(turns.len());
    let tail = turns[turns.len() - keep..].to_vec();
    truncate_to_budget(tail, budget_chars)
}

/// Drop the oldest turns until the remainder fits the budget.
///
/// May return nothing at all: a single turn larger than the budget is
/// dropped too, so the result never exceeds the budget.
fn truncate_to_budget(mut turns: Vec<ChatTurn>, budget_chars: usize) -> Vec<ChatTurn> {
    while !turns.is_empty() && total_chars(&turns) > budget_chars {
        turns.remove(0);
    }
    turns
}
