// crates/hopchain-core/src/scoring.rs
//
// Per-hop quality scoring and local token estimation.
//
// Score starts at 100 and loses points across three dimensions:
//   1. token efficiency   (up to 30): 30 - max(0, 30 - total_tokens / 100)
//   2. latency            (up to 20): min(20, latency_ms / 500)
//   3. context pressure   (up to 30): min(30, total_tokens / window * 50)
// Parse validity is recorded as 20 and never penalized for plain hops.
// Compiled-prompt hops lose up to 20 more: 10 when the JSON parses but lacks
// an intent or execution plan, 20 when it does not parse.

use serde::{Deserialize, Serialize};

/// Default model context window, in tokens.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 4096;

/// Per-dimension components of a hop score, each rounded.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub token_efficiency: u32,
    pub latency_penalty: u32,
    pub context_pressure: u32,
    pub parse_validity: u32,
}

/// A hop score with its breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopScore {
    pub score: u32,
    pub breakdown: ScoreBreakdown,
}

/// Estimate tokens as `ceil(len / 4)`, with the length in UTF-16 code units.
pub fn estimate_tokens(text: &str) -> u64 {
    let units = text.encode_utf16().count() as u64;
    units.div_ceil(4)
}

/// Full marks for parse validity.
pub const PARSE_VALIDITY_MAX: u32 = 20;

/// Score a hop from its token counts, latency, and the model context window.
pub fn score_hop(tokens_in: u64, tokens_out: u64, latency_ms: u64, context_window: u64) -> HopScore {
    score_with_validity(tokens_in, tokens_out, latency_ms, context_window, PARSE_VALIDITY_MAX)
}

/// Score a hop whose content is a compiled prompt, penalizing content that
/// is not a well-formed compiled prompt.
pub fn score_compiled_hop(
    content: &str,
    tokens_in: u64,
    tokens_out: u64,
    latency_ms: u64,
    context_window: u64,
) -> HopScore {
    score_with_validity(
        tokens_in,
        tokens_out,
        latency_ms,
        context_window,
        parse_validity(content),
    )
}

/// 20 for a JSON object with a non-empty `intent` and `execution_plan`,
/// 10 for other JSON, 0 for text that does not parse.
pub fn parse_validity(content: &str) -> u32 {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) if is_truthy(&value["intent"]) && is_truthy(&value["execution_plan"]) => {
            PARSE_VALIDITY_MAX
        }
        Ok(_) => PARSE_VALIDITY_MAX / 2,
        Err(_) => 0,
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn score_with_validity(
    tokens_in: u64,
    tokens_out: u64,
    latency_ms: u64,
    context_window: u64,
    validity: u32,
) -> HopScore {
    let total = (tokens_in + tokens_out) as f64;
    let mut score = 100.0_f64;

    let efficiency = (30.0 - total / 100.0).max(0.0);
    score -= 30.0 - efficiency;

    let latency_penalty = (latency_ms as f64 / 500.0).min(20.0);
    score -= latency_penalty;

    let pressure_penalty = if context_window == 0 {
        30.0
    } else {
        (total / context_window as f64 * 50.0).min(30.0)
    };
    score -= pressure_penalty;

    score -= f64::from(PARSE_VALIDITY_MAX.saturating_sub(validity));

    HopScore {
        score: score.round().clamp(0.0, 100.0) as u32,
        breakdown: ScoreBreakdown {
            token_efficiency: efficiency.round() as u32,
            latency_penalty: latency_penalty.round() as u32,
            context_pressure: pressure_penalty.round() as u32,
            parse_validity: validity,
        },
    }
}

/// Rounded mean of hop scores; 0 for an empty set.
pub fn mean_score(total: u64, count: u64) -> u32 {
    if count == 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as u32
}
