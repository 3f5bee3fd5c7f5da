// crates/hopchain-core/src/hop.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::{HopScore, ScoreBreakdown};

/// Kind of execution step a hop records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HopType {
    /// Prompt interpretation / normalization.
    Interpret,
    /// Routing decision (content is the decision record).
    Route,
    /// Model execution (content is the model output).
    Execute,
    /// Intermediate transformation of a previous output.
    Transform,
    /// Final output delivered to the caller.
    Finalize,
}

impl HopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HopType::Interpret => "interpret",
            HopType::Route => "route",
            HopType::Execute => "execute",
            HopType::Transform => "transform",
            HopType::Finalize => "finalize",
        }
    }
}

/// How the token counts of a hop were obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenMethod {
    /// Reported by the model provider.
    Exact,
    /// Local `ceil(len / 4)` estimate over UTF-16 code units.
    #[default]
    Estimated,
}

/// One recorded, hash-linked step of a session's execution chain.
///
/// Immutable once written. `sha256_hash = digest(prev_hash || content)` and
/// `prev_hash` is the previous hop's hash, or [`crate::GENESIS_HASH`] at index 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hop {
    /// Owning session (back-reference).
    pub session_id: Uuid,
    /// 0-based position in the chain, contiguous per session.
    pub hop_index: u64,
    pub hop_type: HopType,
    /// String payload of the step. This is exactly what gets hashed.
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    #[serde(default)]
    pub token_method: TokenMethod,
    pub latency_ms: u64,
    /// Quality score in 0..=100.
    pub score: u32,
    #[serde(default)]
    pub score_breakdown: ScoreBreakdown,
    /// Absent only on hops imported from foreign ledgers.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub sha256_hash: String,
    pub prev_hash: String,
}

impl Hop {
    /// The tail reference a successor hop would link to.
    pub fn tail(&self) -> ChainTail {
        ChainTail {
            hop_index: self.hop_index,
            sha256_hash: self.sha256_hash.clone(),
        }
    }
}

/// Index and hash of the last hop of a chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainTail {
    pub hop_index: u64,
    pub sha256_hash: String,
}

/// Caller-supplied fields of a hop about to be appended.
///
/// Index, timestamp and hashes are assigned by the chain builder.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHop {
    pub hop_type: HopType,
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub token_method: TokenMethod,
    pub latency_ms: u64,
    pub score: u32,
    pub score_breakdown: ScoreBreakdown,
}

impl NewHop {
    pub fn new(hop_type: HopType, content: impl Into<String>) -> Self {
        Self {
            hop_type,
            content: content.into(),
            tokens_in: 0,
            tokens_out: 0,
            token_method: TokenMethod::Estimated,
            latency_ms: 0,
            score: 0,
            score_breakdown: ScoreBreakdown::default(),
        }
    }

    pub fn tokens(mut self, tokens_in: u64, tokens_out: u64, method: TokenMethod) -> Self {
        self.tokens_in = tokens_in;
        self.tokens_out = tokens_out;
        self.token_method = method;
        self
    }

    pub fn latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a bare score, leaving the breakdown empty.
    pub fn score(mut self, score: u32) -> Self {
        self.score = score.min(100);
        self
    }

    /// Set score and breakdown from a computed [`HopScore`].
    pub fn scored(mut self, score: HopScore) -> Self {
        self.score = score.score;
        self.score_breakdown = score.breakdown;
        self
    }
}
