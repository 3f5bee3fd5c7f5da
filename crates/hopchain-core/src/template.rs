// crates/hopchain-core/src/template.rs

use serde::{Deserialize, Serialize};

/// Curated, read-only reference data used to suggest a starting packet for
/// a free-text intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub intent: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Extra matching keywords.
    #[serde(default)]
    pub embedding_hint: Option<String>,
    /// Packet JSON the template instantiates.
    #[serde(default)]
    pub packet_json: String,
    #[serde(default)]
    pub baseline_prompt_tokens: u64,
    #[serde(default)]
    pub baseline_completion_tokens: u64,
    #[serde(default)]
    pub reuse_count: u64,
}

impl Template {
    /// Text the matcher compares a query against.
    pub fn match_text(&self) -> String {
        format!(
            "{} {} {}",
            self.name,
            self.intent,
            self.embedding_hint.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::json!({
            "id": "tpl_1",
            "name": "Data Sync",
            "intent": "Synchronize data",
            "embeddingHint": "sync",
            "packetJson": "{}",
            "baselinePromptTokens": 500
        });
        let t: Template = serde_json::from_value(json).unwrap();
        assert_eq!(t.embedding_hint.as_deref(), Some("sync"));
        assert_eq!(t.baseline_prompt_tokens, 500);
        assert_eq!(t.match_text(), "Data Sync Synchronize data sync");
    }

    #[test]
    fn test_match_text_without_hint() {
        let t = Template {
            name: "A".to_string(),
            intent: "B".to_string(),
            ..Default::default()
        };
        assert_eq!(t.match_text(), "A B ");
    }
}
