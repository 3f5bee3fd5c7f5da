// crates/hopchain-cli/src/commands/demo.rs
//
// `hopchain demo`: run a prompt through CommandRunner with a local echo
// model, export the session, and re-verify the export. With --tamper, the
// execute hop is rewritten in the repository before exporting.

use clap::Args;
use tabled::Tabled;

use hopchain_core::hop::HopType;

use crate::config::HopchainConfig;
use crate::output::{format_json, format_table, short_hash, truncate, OutputFormat};
use crate::repository;

#[derive(Debug, Args)]
pub struct DemoCmd {
    /// Prompt to run.
    #[arg(long, default_value = "Sync customer data between the CRM and the warehouse")]
    pub prompt: String,

    /// Rewrite the execute hop after the run, as an attacker editing the store would.
    #[arg(long)]
    pub tamper: bool,

    /// Write the export document here.
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Tabled)]
struct HopRow {
    #[tabled(rename = "#")]
    index: u64,
    #[tabled(rename = "Type")]
    hop_type: String,
    #[tabled(rename = "Content")]
    content: String,
    #[tabled(rename = "Tokens")]
    tokens: String,
    #[tabled(rename = "Score")]
    score: u32,
    #[tabled(rename = "Hash")]
    hash: String,
}

pub async fn run(
    cmd: &DemoCmd,
    config: &HopchainConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = repository::open(config)?;
    let runner = super::runner(config, &repo)?;

    let outcome = runner.run(&cmd.prompt).await?;

    if cmd.tamper {
        if let Some(hop) = outcome.hops.iter().find(|h| h.hop_type == HopType::Execute) {
            let mut edited = hop.clone();
            edited.content = format!("{} (edited)", edited.content);
            repo.overwrite_hop(&edited)?;
            tracing::warn!("Tampered with hop {} of session {}", hop.hop_index, hop.session_id);
        }
    }

    let document = super::export::exporter(config, &repo)
        .export(&outcome.session.id)
        .await?;
    let check = document.reverify(super::crypto())?;
    repository::save(config, &repo)?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&document)),
        OutputFormat::Table => {
            let rows: Vec<HopRow> = document
                .hop_ledger
                .iter()
                .map(|h| HopRow {
                    index: h.hop_index,
                    hop_type: h.hop_type.as_str().to_string(),
                    content: truncate(&h.content, 40),
                    tokens: format!("{}/{}", h.tokens_in, h.tokens_out),
                    score: h.score,
                    hash: short_hash(&h.sha256_hash),
                })
                .collect();
            let totals = &document.session.totals;
            println!("Session {}", document.session.id);
            println!("  Routed to: {}", outcome.decision.model);
            println!();
            println!("{}", format_table(&rows));
            println!();
            println!(
                "Tokens: {}  |  Cost: {:.6}  |  Context used: {:.1}%  |  Score: {}",
                totals.total_tokens,
                totals.cost_estimate,
                totals.context_window_used,
                totals.session_score
            );
            println!(
                "Chain valid: {}  |  Audit trail complete: {}  |  Export signature valid: {}",
                document.chain_verification.is_valid,
                document.compliance.audit_trail_complete,
                check.signature_valid
            );
            println!("Document signature: {}", document.document_signature);
        }
    }

    if let Some(path) = &cmd.out {
        super::export::write_document(&document, Some(path))?;
    }
    Ok(())
}
