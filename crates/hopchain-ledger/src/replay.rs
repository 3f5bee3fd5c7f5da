// crates/hopchain-ledger/src/replay.rs
//
// Routing replay: re-evaluate every recorded `route` hop against a rule
// engine and check that the recorded model is reproduced.

use serde::{Deserialize, Serialize};

use hopchain_core::hop::{Hop, HopType};
use hopchain_routing::compiler::CompiledPrompt;
use hopchain_routing::rules::{RequestFeatures, RoutingDecision, RoutingRuleEngine};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayEntry {
    pub hop_index: u64,
    /// `None` when the hop content is not a routing decision.
    pub recorded_model: Option<String>,
    pub replayed_model: String,
    pub reproduced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayReport {
    pub all_reproduced: bool,
    pub entries: Vec<ReplayEntry>,
}

/// Replay the routing decisions recorded in `hops` (ordered by index).
///
/// Features come from the closest preceding `interpret` hop. Its content is
/// a compiled prompt whose `prompt` field is the normalized prompt; content
/// that does not parse as one is taken as the prompt itself. Without an
/// interpret hop, only the recorded prompt length is used.
pub fn check_routing_replay(hops: &[Hop], engine: &RoutingRuleEngine) -> ReplayReport {
    let mut entries = Vec::new();
    let mut prompt: Option<String> = None;

    for hop in hops {
        match hop.hop_type {
            HopType::Interpret => prompt = Some(interpreted_prompt(&hop.content)),
            HopType::Route => {
                let recorded = RoutingDecision::from_json(&hop.content).ok();
                let features = match (prompt.as_deref(), &recorded) {
                    (Some(p), _) => RequestFeatures::from_prompt(p),
                    (None, Some(d)) => RequestFeatures::with_length(d.prompt_length),
                    (None, None) => RequestFeatures::default(),
                };
                let replayed_model = engine.evaluate(&features).to_string();
                let recorded_model = recorded.map(|d| d.model);
                let reproduced = recorded_model.as_deref() == Some(replayed_model.as_str());
                if !reproduced {
                    tracing::warn!(
                        "Route hop {} not reproduced: recorded {:?}, replayed {}",
                        hop.hop_index,
                        recorded_model,
                        replayed_model
                    );
                }
                entries.push(ReplayEntry {
                    hop_index: hop.hop_index,
                    recorded_model,
                    replayed_model,
                    reproduced,
                });
            }
            _ => {}
        }
    }

    ReplayReport {
        all_reproduced: entries.iter().all(|e| e.reproduced),
        entries,
    }
}

fn interpreted_prompt(content: &str) -> String {
    CompiledPrompt::from_json(content)
        .map(|compiled| compiled.prompt)
        .unwrap_or_else(|_| content.to_string())
}
