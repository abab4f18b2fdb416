//! Engine configuration snapshot.
//!
//! Components receive an immutable [`EngineConfig`] at construction;
//! there is no shared mutable settings object. Rule-set changes produce
//! a new snapshot for the next run.

use serde::Deserialize;

/// Tuning knobs for a backlog run.
///
/// The heuristic and learning thresholds are empirically chosen
/// defaults, not load-bearing exact values; every one of them can be
/// overridden from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum critical score for a heuristic INBOX decision.
    pub critical_threshold: f32,
    /// Minimum priority score for a heuristic PRIORITY decision.
    pub priority_threshold: f32,

    /// Messages fetched per listing page.
    pub page_size: u32,
    /// Messages classified per sub-batch (pause/cancel checkpoint).
    pub batch_size: usize,
    /// Maximum ids per bulk mutation call.
    pub mutate_chunk_size: usize,
    /// Cap on messages matched per provider filter.
    pub max_messages_per_filter: usize,

    /// Maximum retained history records.
    pub history_capacity: usize,
    /// Minimum sightings of a sender before suggesting a rule.
    pub min_sender_occurrences: usize,
    /// Fraction of a sender's decisions that must agree on one category.
    pub sender_consistency: f32,
    /// Fraction of a correction cluster a keyword must appear in.
    pub keyword_frequency: f32,
    /// Minimum user corrections toward one category before mining keywords.
    pub min_correction_cluster: usize,
    /// REVIEW cluster size above which a new category is proposed.
    pub min_pattern_cluster: usize,

    /// Token budget for model completions.
    pub model_max_tokens: u32,
    /// Sampling temperature for model completions.
    pub model_temperature: f32,
    /// Body excerpt length included in prompts.
    pub body_excerpt_chars: usize,
    /// Maximum stored length for decision reasons.
    pub reason_max_chars: usize,
    /// Subject length retained in history records.
    pub subject_history_chars: usize,

    /// Shared retry/backoff parameters.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 0.7,
            priority_threshold: 0.5,
            page_size: 500,
            batch_size: 100,
            mutate_chunk_size: 100,
            max_messages_per_filter: 1000,
            history_capacity: 1000,
            min_sender_occurrences: 3,
            sender_consistency: 0.8,
            keyword_frequency: 0.3,
            min_correction_cluster: 2,
            min_pattern_cluster: 10,
            model_max_tokens: 200,
            model_temperature: 0.1,
            body_excerpt_chars: 1000,
            reason_max_chars: 200,
            subject_history_chars: 80,
            retry: RetryConfig::default(),
        }
    }
}

/// Parameters for the shared retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before giving up (initial call included).
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling for any single backoff delay.
    pub max_delay_ms: u64,
    /// Multiplier between consecutive delays.
    pub backoff_factor: f64,
    /// First backoff delay for rate-limit errors (longer curve).
    pub rate_limit_base_delay_ms: u64,
    /// Additive jitter as a fraction of the delay (0.25 = up to +25%).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            rate_limit_base_delay_ms: 5000,
            jitter: 0.25,
        }
    }
}
