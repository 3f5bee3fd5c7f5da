// crates/hopchain-cli/src/commands/mod.rs
//
// Command module declarations for the hopchain CLI, plus the pieces every
// command builds from the configuration.

pub mod audit;
pub mod demo;
pub mod export;
pub mod packet;
pub mod replay;
pub mod route;
pub mod templates;
pub mod verify_chain;
pub mod verify_export;

use std::sync::Arc;

use async_trait::async_trait;

use hopchain_core::crypto::{CryptoProvider, Sha256Provider};
use hopchain_core::error::HopchainError;
use hopchain_core::traits::{Completion, LanguageModel};
use hopchain_ledger::{ChainBuilder, CommandRunner};
use hopchain_routing::RoutingRuleEngine;
use hopchain_store::MemoryRepository;

use crate::config::HopchainConfig;

/// Model stand-in that answers with the prompt it was given.
/// Reports no usage, so token counts are estimated.
pub struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn invoke(&self, model: &str, prompt: &str) -> Result<Completion, HopchainError> {
        Ok(Completion {
            text: format!("[{}] Plan for: {}", model, prompt),
            usage: None,
        })
    }
}

pub fn crypto() -> Arc<dyn CryptoProvider> {
    Arc::new(Sha256Provider::new())
}

/// Routing engine from the configured rules and default model.
pub fn engine(config: &HopchainConfig) -> Result<RoutingRuleEngine, Box<dyn std::error::Error>> {
    Ok(RoutingRuleEngine::new(
        config.routing_rules.clone(),
        config.default_model.clone(),
    )?)
}

/// CommandRunner over the local repository, answering with [`EchoModel`].
pub fn runner(
    config: &HopchainConfig,
    repo: &Arc<MemoryRepository>,
) -> Result<CommandRunner, Box<dyn std::error::Error>> {
    let builder = ChainBuilder::new(repo.clone(), crypto())
        .with_pricing(config.pricing.clone())
        .with_max_retries(config.max_append_retries);
    Ok(
        CommandRunner::new(repo.clone(), builder, Arc::new(EchoModel), engine(config)?)?
            .with_max_tokens(config.max_tokens),
    )
}

pub fn parse_session_id(id: &str) -> Result<uuid::Uuid, Box<dyn std::error::Error>> {
    uuid::Uuid::parse_str(id).map_err(|e| format!("invalid session id '{}': {}", id, e).into())
}
