//! Chat service configuration types for Inkwell.
//!
//! `ChatConfig` controls the input budget, history retention, concurrency
//! limits, and daily quota. All fields have defaults so an empty config
//! file yields a working service.

use serde::{Deserialize, Serialize};

/// Top-level chat orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub input: InputLimits,
    #[serde(default)]
    pub history: HistoryLimits,
    #[serde(default)]
    pub concurrency: ConcurrencyLimits,
    #[serde(default)]
    pub quota: QuotaLimits,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            input: InputLimits::default(),
            history: HistoryLimits::default(),
            concurrency: ConcurrencyLimits::default(),
            quota: QuotaLimits::default(),
        }
    }
}

/// Character budgets for a single request's combined input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLimits {
    /// Cap on message + system prompt + history, in characters.
    #[serde(default = "default_max_total_input_chars")]
    pub max_total_input_chars: usize,

    /// Cap on the user's message alone, in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Headroom subtracted from the total budget before fitting history.
    #[serde(default = "default_safety_buffer_chars")]
    pub safety_buffer_chars: usize,
}

fn default_max_total_input_chars() -> usize {
    25_000
}

fn default_max_message_chars() -> usize {
    10_000
}

fn default_safety_buffer_chars() -> usize {
    2_000
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_total_input_chars: default_max_total_input_chars(),
            max_message_chars: default_max_message_chars(),
            safety_buffer_chars: default_safety_buffer_chars(),
        }
    }
}

/// Retention limits for per-user conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryLimits {
    /// Maximum turns kept per user; oldest are evicted first.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Maximum combined characters kept per user.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Idle time-to-live of a user's history, in seconds.
    #[serde(default = "default_history_ttl_secs")]
    pub ttl_secs: u64,

    /// Recent turns preserved verbatim during compression.
    #[serde(default = "default_recent_turns_kept")]
    pub recent_turns_kept: usize,

    /// Turns kept when compression falls back to plain truncation.
    #[serde(default = "default_fallback_recent_turns")]
    pub fallback_recent_turns: usize,
}

fn default_max_turns() -> usize {
    50
}

fn default_max_chars() -> usize {
    20_000
}

fn default_history_ttl_secs() -> u64 {
    86_400
}

fn default_recent_turns_kept() -> usize {
    5
}

fn default_fallback_recent_turns() -> usize {
    3
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_chars: default_max_chars(),
            ttl_secs: default_history_ttl_secs(),
            recent_turns_kept: default_recent_turns_kept(),
            fallback_recent_turns: default_fallback_recent_turns(),
        }
    }
}

/// Concurrency and queueing limits for the admission controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyLimits {
    /// Requests allowed to stream simultaneously.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Requests allowed to wait for a slot before new arrivals are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Maximum time a request may wait in the queue, in seconds.
    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,

    /// Interval between stale-ticket sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Age after which an active ticket is considered leaked and reclaimed.
    #[serde(default = "default_max_ticket_age_secs")]
    pub max_ticket_age_secs: u64,
}

fn default_max_concurrent() -> usize {
    15
}

fn default_queue_capacity() -> usize {
    100
}

fn default_queue_timeout_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_ticket_age_secs() -> u64 {
    300
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
            queue_timeout_secs: default_queue_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_ticket_age_secs: default_max_ticket_age_secs(),
        }
    }
}

/// Daily free-tier quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Free daily allowance expressed in words.
    #[serde(default = "default_free_daily_words")]
    pub free_daily_words: u64,
}

fn default_free_daily_words() -> u64 {
    4_000
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            free_daily_words: default_free_daily_words(),
        }
    }
}

impl QuotaLimits {
    /// Daily allowance in estimation units (1 word ~ 1.5 units).
    pub fn daily_unit_limit(&self) -> u64 {
        self.free_daily_words
            .saturating_mul(3)
            .div_ceil(2)
    }
}
