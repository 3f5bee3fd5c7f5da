// crates/hopchain-cli/src/commands/export.rs
//
// `hopchain export --session <id> [--out <path>]`: write a signed export
// document for a stored session.

use std::fs;
use std::sync::Arc;

use clap::Args;

use hopchain_export::{ExportDocument, SessionExporter};
use hopchain_store::MemoryRepository;

use crate::config::HopchainConfig;
use crate::repository;

#[derive(Debug, Args)]
pub struct ExportCmd {
    /// Session UUID.
    #[arg(long)]
    pub session: String,

    /// Output file. Prints to stdout when omitted.
    #[arg(long)]
    pub out: Option<String>,
}

/// Exporter configured with the CLI's identity and format version.
pub fn exporter(config: &HopchainConfig, repo: &Arc<MemoryRepository>) -> SessionExporter {
    SessionExporter::new(repo.clone(), repo.clone(), super::crypto())
        .with_exporter(config.exporter.clone())
        .with_format_version(config.format_version.clone())
}

/// Write `document` to `out`, or to stdout.
pub fn write_document(
    document: &ExportDocument,
    out: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = document.to_json()?;
    match out {
        Some(path) => {
            fs::write(path, json)?;
            println!("Export written to {}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn run(cmd: &ExportCmd, config: &HopchainConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session_id = super::parse_session_id(&cmd.session)?;
    let repo = repository::open(config)?;
    let document = exporter(config, &repo).export(&session_id).await?;
    write_document(&document, cmd.out.as_deref())
}
