// crates/hopchain-cli/src/commands/replay.rs
//
// `hopchain replay --session <id>`: check that a stored session's routing
// decisions are reproduced by the current rules.

use clap::Args;
use tabled::Tabled;

use hopchain_core::traits::HopStore;
use hopchain_ledger::check_routing_replay;

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, OutputFormat};
use crate::repository;

#[derive(Debug, Args)]
pub struct ReplayCmd {
    /// Session UUID.
    #[arg(long)]
    pub session: String,
}

#[derive(Tabled)]
struct ReplayRow {
    #[tabled(rename = "Hop")]
    hop_index: u64,
    #[tabled(rename = "Recorded")]
    recorded: String,
    #[tabled(rename = "Replayed")]
    replayed: String,
    #[tabled(rename = "Reproduced")]
    reproduced: bool,
}

pub async fn run(
    cmd: &ReplayCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_id = super::parse_session_id(&cmd.session)?;
    let repo = repository::open(config)?;
    let hops = repo.list_hops(&session_id).await?;
    let report = check_routing_replay(&hops, &super::engine(config)?);

    match format {
        OutputFormat::Json => println!("{}", format_json(&report)),
        OutputFormat::Table => {
            let rows: Vec<ReplayRow> = report
                .entries
                .iter()
                .map(|e| ReplayRow {
                    hop_index: e.hop_index,
                    recorded: e.recorded_model.clone().unwrap_or_else(|| "?".to_string()),
                    replayed: e.replayed_model.clone(),
                    reproduced: e.reproduced,
                })
                .collect();
            println!("{}", format_table(&rows));
        }
    }

    if !report.all_reproduced {
        return Err(format!("routing of session {} is not reproduced", session_id).into());
    }
    Ok(())
}
