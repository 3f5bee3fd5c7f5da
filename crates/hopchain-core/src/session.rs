// crates/hopchain-core/src/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hop::Hop;
use crate::scoring::{mean_score, DEFAULT_CONTEXT_WINDOW};

/// Lifecycle of a command run.
///
///   Pending --> Compiling --> Running --> Success
///                                 |
///                                 v
///                               Error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Compiling,
    Running,
    Success,
    Error,
}

/// One command run and the owner of its hop chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique identifier (UUID v7 for time-ordering).
    pub id: Uuid,
    pub status: SessionStatus,
    /// Model that executed the run (the routing decision once known).
    pub model_name: String,
    pub raw_prompt: String,
    pub final_output: Option<String>,
    /// Accumulators, owned by the hop append path.
    #[serde(flatten)]
    pub totals: SessionTotals,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a pending session with empty totals.
    pub fn new(raw_prompt: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: SessionStatus::Pending,
            model_name: model_name.into(),
            raw_prompt: raw_prompt.into(),
            final_output: None,
            totals: SessionTotals::default(),
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Token, cost, latency and score accumulators of a session.
///
/// Only ever replaced together with a hop write, so `hop_count` and
/// `chain_hash` always describe the stored chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_estimate: f64,
    pub total_latency_ms: u64,
    /// Percentage of the context window consumed by prompt tokens.
    pub context_window_used: f64,
    /// Rounded mean of all hop scores.
    pub session_score: u32,
    #[serde(default)]
    pub score_total: u64,
    #[serde(default)]
    pub hop_count: u64,
    /// Hash of the last hop; `None` for an empty chain.
    #[serde(default)]
    pub chain_hash: Option<String>,
}

impl SessionTotals {
    /// Totals after appending `hop`.
    pub fn with_hop(&self, hop: &Hop, pricing: &PricingModel) -> SessionTotals {
        let prompt_tokens = self.prompt_tokens + hop.tokens_in;
        let completion_tokens = self.completion_tokens + hop.tokens_out;
        let score_total = self.score_total + u64::from(hop.score);
        let hop_count = self.hop_count + 1;

        SessionTotals {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_estimate: pricing.cost(prompt_tokens, completion_tokens),
            total_latency_ms: self.total_latency_ms + hop.latency_ms,
            context_window_used: pricing.context_used_percent(prompt_tokens),
            session_score: mean_score(score_total, hop_count),
            score_total,
            hop_count,
            chain_hash: Some(hop.sha256_hash.clone()),
        }
    }
}

/// Per-model pricing and context window used for session totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingModel {
    #[serde(default)]
    pub cost_per_1k_input: f64,
    #[serde(default)]
    pub cost_per_1k_output: f64,
    #[serde(default = "default_context_window")]
    pub context_window: u64,
}

fn default_context_window() -> u64 {
    DEFAULT_CONTEXT_WINDOW
}

impl Default for PricingModel {
    fn default() -> Self {
        Self {
            cost_per_1k_input: 0.0,
            cost_per_1k_output: 0.0,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl PricingModel {
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        prompt_tokens as f64 / 1000.0 * self.cost_per_1k_input
            + completion_tokens as f64 / 1000.0 * self.cost_per_1k_output
    }

    pub fn context_used_percent(&self, prompt_tokens: u64) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        prompt_tokens as f64 / self.context_window as f64 * 100.0
    }
}
