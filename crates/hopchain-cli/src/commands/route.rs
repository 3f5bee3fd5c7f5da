// crates/hopchain-cli/src/commands/route.rs
//
// `hopchain route --prompt <text>`: evaluate the configured routing rules.

use clap::Args;

use hopchain_ledger::normalize_prompt;
use hopchain_routing::RequestFeatures;

use crate::config::HopchainConfig;
use crate::output::{format_json, OutputFormat};

#[derive(Debug, Args)]
pub struct RouteCmd {
    /// Prompt to route. Whitespace is normalized as a run would.
    #[arg(long)]
    pub prompt: String,
}

pub fn run(
    cmd: &RouteCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = super::engine(config)?;
    let decision = engine.route(&RequestFeatures::from_prompt(&normalize_prompt(&cmd.prompt)));

    match format {
        OutputFormat::Json => println!("{}", format_json(&decision)),
        OutputFormat::Table => {
            println!("Model: {}", decision.model);
            match decision.matched_rule {
                Some(i) => println!("  Matched rule {} of {}", i, engine.rules().len()),
                None => println!("  No rule matched; using default"),
            }
            println!("  Prompt length: {}", decision.prompt_length);
        }
    }
    Ok(())
}
