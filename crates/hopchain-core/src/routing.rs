// crates/hopchain-core/src/routing.rs

use serde::{Deserialize, Serialize};

use crate::error::HopchainError;

/// Conditions of a routing rule. Every present condition must hold.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleCondition {
    /// Exclusive upper bound on prompt length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_length_lt: Option<usize>,
    /// Inclusive lower bound on prompt length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_length_gte: Option<usize>,
    /// Matches when the prompt contains any of these, case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains_keywords: Vec<String>,
}

impl RuleCondition {
    pub fn is_empty(&self) -> bool {
        self.prompt_length_lt.is_none()
            && self.prompt_length_gte.is_none()
            && self.contains_keywords.is_empty()
    }
}

/// One entry of an ordered condition -> model mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutingRule {
    pub condition: RuleCondition,
    pub choose_model: String,
}

impl RoutingRule {
    pub fn new(condition: RuleCondition, choose_model: impl Into<String>) -> Self {
        Self {
            condition,
            choose_model: choose_model.into(),
        }
    }

    /// Rule matching prompts shorter than `n`.
    pub fn shorter_than(n: usize, choose_model: impl Into<String>) -> Self {
        Self::new(
            RuleCondition {
                prompt_length_lt: Some(n),
                ..Default::default()
            },
            choose_model,
        )
    }

    /// Rule matching prompts of at least `n`.
    pub fn at_least(n: usize, choose_model: impl Into<String>) -> Self {
        Self::new(
            RuleCondition {
                prompt_length_gte: Some(n),
                ..Default::default()
            },
            choose_model,
        )
    }

    /// Reject rules with no condition or no target model.
    pub fn validate(&self) -> Result<(), HopchainError> {
        if self.condition.is_empty() {
            return Err(HopchainError::Validation(
                "routing rule needs prompt_length_lt, prompt_length_gte, or contains_keywords"
                    .to_string(),
            ));
        }
        if self.choose_model.trim().is_empty() {
            return Err(HopchainError::Validation(
                "routing rule has an empty choose_model".to_string(),
            ));
        }
        if self
            .condition
            .contains_keywords
            .iter()
            .any(|k| k.trim().is_empty())
        {
            return Err(HopchainError::Validation(
                "routing rule has an empty keyword".to_string(),
            ));
        }
        Ok(())
    }
}
