//! History retention caps.

use inkwell_types::chat::{ChatTurn, TurnRole};
use inkwell_types::config::HistoryLimits;

use crate::tokens::char_len;

/// Combined character count of a slice of turns.
pub fn total_chars(turns: &[ChatTurn]) -> usize {
    turns.iter().map(|t| char_len(&t.content)).sum()
}

/// Enforce retention caps on a user's stored history.
///
/// System turns are always kept. Non-system turns are packed
/// newest-first under both the turn-count cap and the combined-char cap,
/// then the whole set is re-sorted chronologically. At least one
/// non-system turn survives even when it alone exceeds the char cap.
pub fn enforce_caps(turns: Vec<ChatTurn>, limits: &HistoryLimits) -> Vec<ChatTurn> {
    let (system, mut rest): (Vec<_>, Vec<_>) = turns
        .into_iter()
        .partition(|t| t.role == TurnRole::System);

    let turn_cap = limits.max_turns.saturating_sub(system.len());
    let mut used_chars = total_chars(&system);
    let mut kept: Vec<ChatTurn> = Vec::new();
    while let Some(turn) = rest.pop() {
        if kept.len() >= turn_cap {
            break;
        }
        let cost = char_len(&turn.content);
        if !kept.is_empty() && used_chars + cost > limits.max_chars {
            break;
        }
        used_chars += cost;
        kept.push(turn);
    }

    let mut result = system;
    result.extend(kept);
    result.sort_by_key(|t| t.created_at);
    result
}
