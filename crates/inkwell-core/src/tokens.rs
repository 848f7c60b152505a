//! Length estimation and input budget math.
//!
//! The service meters usage in "units", a cheap character-based estimate
//! of token consumption: one character costs 1.5 units, rounded up. The
//! same arithmetic backs the daily quota and the per-request input budget,
//! so both sides of the ledger agree.

use inkwell_types::config::InputLimits;

/// Convert a word count to estimation units (`ceil(words * 1.5)`).
pub fn words_to_units(words: u64) -> u64 {
    words.saturating_mul(3).div_ceil(2)
}

/// Convert estimation units back to whole words (`floor(units / 1.5)`).
pub fn units_to_words(units: u64) -> u64 {
    units.saturating_mul(2) / 3
}

/// Estimate the unit cost of a piece of text.
///
/// Each character counts as one word, so units are `ceil(chars * 1.5)`,
/// counted in Unicode scalar values rather than bytes so multi-byte
/// scripts are not over-billed.
pub fn estimate_units(text: &str) -> u64 {
    words_to_units(text.chars().count() as u64)
}

/// Character count of a piece of text, as used by all input budgets.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Compute the character budget left for conversation history.
///
/// The total input budget covers the user message, the system prompt, the
/// history, and a fixed safety buffer. Returns `None` when the message and
/// system prompt alone exhaust the budget, in which case the request
/// cannot proceed regardless of how hard history is compressed.
pub fn history_budget(
    limits: &InputLimits,
    message_chars: usize,
    system_chars: usize,
) -> Option<usize> {
    let reserved = message_chars
        .checked_add(system_chars)?
        .checked_add(limits.safety_buffer_chars)?;
    let budget = limits.max_total_input_chars.checked_sub(reserved)?;
    if budget == 0 { None } else { Some(budget) }
}
