// crates/hopchain-cli/src/config.rs
//
// Runtime configuration for the hopchain CLI.
// Loaded from a TOML file or populated with defaults.

use serde::Deserialize;
use std::fs;

use hopchain_core::routing::RoutingRule;
use hopchain_core::session::PricingModel;
use hopchain_export::EXPORT_FORMAT_VERSION;
use hopchain_ledger::DEFAULT_MAX_APPEND_RETRIES;
use hopchain_routing::compiler::DEFAULT_MAX_TOKENS;
use hopchain_routing::DEFAULT_MIN_SCORE;

#[derive(Debug, Clone, Deserialize)]
pub struct HopchainConfig {
    /// Log level used when RUST_LOG is unset: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON snapshot file backing the local repository.
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Identity recorded in export metadata.
    #[serde(default = "default_exporter")]
    pub exporter: String,

    /// Format version recorded in export metadata.
    #[serde(default = "default_format_version")]
    pub format_version: String,

    /// Identity recorded as `signed_by` on packets.
    #[serde(default = "default_signer")]
    pub signer: String,

    #[serde(default = "default_max_append_retries")]
    pub max_append_retries: u32,

    /// Model used when no routing rule matches.
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_min_template_score")]
    pub min_template_score: u32,

    /// Completion budget ceiling for compiled prompts.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    #[serde(default)]
    pub pricing: PricingModel,

    /// Ordered routing rules, as `[[routing_rules]]` tables.
    #[serde(default = "default_routing_rules")]
    pub routing_rules: Vec<RoutingRule>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_file() -> String {
    "~/.hopchain/repository.json".to_string()
}

fn default_exporter() -> String {
    "hopchain-cli".to_string()
}

fn default_format_version() -> String {
    EXPORT_FORMAT_VERSION.to_string()
}

fn default_signer() -> String {
    "local".to_string()
}

fn default_max_append_retries() -> u32 {
    DEFAULT_MAX_APPEND_RETRIES
}

fn default_model() -> String {
    "smart_model".to_string()
}

fn default_min_template_score() -> u32 {
    DEFAULT_MIN_SCORE
}

fn default_max_tokens() -> u64 {
    DEFAULT_MAX_TOKENS
}

fn default_routing_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::shorter_than(100, "fast_model"),
        RoutingRule::at_least(100, "smart_model"),
    ]
}

impl Default for HopchainConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_file: default_data_file(),
            exporter: default_exporter(),
            format_version: default_format_version(),
            signer: default_signer(),
            max_append_retries: default_max_append_retries(),
            default_model: default_model(),
            min_template_score: default_min_template_score(),
            max_tokens: default_max_tokens(),
            pricing: PricingModel::default(),
            routing_rules: default_routing_rules(),
        }
    }
}

impl HopchainConfig {
    /// Load configuration from a TOML file at the given path.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(expand_tilde(path))?;
        let config: HopchainConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// `data_file` with `~` expanded.
    pub fn data_path(&self) -> String {
        expand_tilde(&self.data_file)
    }
}

/// Default config location: `~/.hopchain/config.toml`.
pub fn default_config_path() -> String {
    "~/.hopchain/config.toml".to_string()
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: HopchainConfig = toml::from_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_append_retries, DEFAULT_MAX_APPEND_RETRIES);
        assert_eq!(config.routing_rules.len(), 2);
        assert_eq!(config.pricing.context_window, 4096);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_rules_and_pricing_from_toml() {
        let config: HopchainConfig = toml::from_str(
            r#"
            default_model = "general"
            exporter = "audit-team"

            [pricing]
            cost_per_1k_input = 0.5
            cost_per_1k_output = 1.5
            context_window = 8192

            [[routing_rules]]
            choose_model = "billing"
            [routing_rules.condition]
            contains_keywords = ["invoice", "refund"]

            [[routing_rules]]
            choose_model = "fast"
            [routing_rules.condition]
            prompt_length_lt = 80
            "#,
        )
        .unwrap();
        assert_eq!(config.default_model, "general");
        assert_eq!(config.exporter, "audit-team");
        assert_eq!(config.pricing.context_window, 8192);
        assert_eq!(config.routing_rules.len(), 2);
        assert_eq!(config.routing_rules[0].condition.contains_keywords.len(), 2);
        assert_eq!(config.routing_rules[1].condition.prompt_length_lt, Some(80));
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/x.json"), "/tmp/x.json");
        assert_eq!(expand_tilde("rel/x.json"), "rel/x.json");
    }
}
