// crates/hopchain-routing/src/rules.rs
//
// RoutingRuleEngine: first matching rule wins, otherwise the default model.
// Evaluation is a pure function of (rules, features, default).

use serde::{Deserialize, Serialize};

use hopchain_core::error::HopchainError;
use hopchain_core::routing::{RoutingRule, RuleCondition};

/// Prompt length in UTF-16 code units, the unit browser and JS clients
/// report, so supplementary-plane characters count twice.
pub fn prompt_length(prompt: &str) -> usize {
    prompt.encode_utf16().count()
}

/// Request properties routing conditions are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFeatures {
    /// Prompt length in UTF-16 code units.
    pub prompt_length: usize,
    /// Prompt text, lowercased, for keyword conditions.
    text: String,
}

impl RequestFeatures {
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            prompt_length: prompt_length(prompt),
            text: prompt.to_lowercase(),
        }
    }

    /// Features with only a length. Keyword conditions never match these.
    pub fn with_length(prompt_length: usize) -> Self {
        Self {
            prompt_length,
            text: String::new(),
        }
    }

    fn contains_any(&self, keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|kw| self.text.contains(&kw.to_lowercase()))
    }
}

fn condition_holds(condition: &RuleCondition, features: &RequestFeatures) -> bool {
    if let Some(lt) = condition.prompt_length_lt {
        if features.prompt_length >= lt {
            return false;
        }
    }
    if let Some(gte) = condition.prompt_length_gte {
        if features.prompt_length < gte {
            return false;
        }
    }
    if !condition.contains_keywords.is_empty() && !features.contains_any(&condition.contains_keywords)
    {
        return false;
    }
    true
}

/// Position of the first rule whose condition holds.
fn first_match(rules: &[RoutingRule], features: &RequestFeatures) -> Option<usize> {
    rules
        .iter()
        .position(|rule| condition_holds(&rule.condition, features))
}

/// Select a model: the first matching rule's `choose_model`, else `default_model`.
pub fn evaluate<'a>(
    rules: &'a [RoutingRule],
    features: &RequestFeatures,
    default_model: &'a str,
) -> &'a str {
    match first_match(rules, features) {
        Some(i) => &rules[i].choose_model,
        None => default_model,
    }
}

/// A routing outcome, recorded as the content of a `route` hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingDecision {
    pub model: String,
    /// Index of the rule that matched; `None` when the default was used.
    pub matched_rule: Option<usize>,
    pub prompt_length: usize,
}

impl RoutingDecision {
    pub fn to_json(&self) -> Result<String, HopchainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HopchainError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A validated, ordered rule set with a fallback model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRuleEngine {
    rules: Vec<RoutingRule>,
    default_model: String,
}

impl RoutingRuleEngine {
    /// Build an engine, rejecting malformed rules and an empty default.
    pub fn new(rules: Vec<RoutingRule>, default_model: impl Into<String>) -> Result<Self, HopchainError> {
        let default_model = default_model.into();
        if default_model.trim().is_empty() {
            return Err(HopchainError::Validation(
                "default model must not be empty".to_string(),
            ));
        }
        for (i, rule) in rules.iter().enumerate() {
            rule.validate().map_err(|e| match e {
                HopchainError::Validation(msg) => {
                    HopchainError::Validation(format!("rule {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        tracing::debug!("Routing engine with {} rules, default {}", rules.len(), default_model);
        Ok(Self {
            rules,
            default_model,
        })
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn evaluate(&self, features: &RequestFeatures) -> &str {
        evaluate(&self.rules, features, &self.default_model)
    }

    pub fn route(&self, features: &RequestFeatures) -> RoutingDecision {
        let matched_rule = first_match(&self.rules, features);
        let model = match matched_rule {
            Some(i) => self.rules[i].choose_model.clone(),
            None => self.default_model.clone(),
        };
        RoutingDecision {
            model,
            matched_rule,
            prompt_length: features.prompt_length,
        }
    }
}
